//! Event Publisher Implementation
//!
//! 编辑器事件广播（保存状态指示器、封面处理结果等由 UI 订阅）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::infrastructure::worker::SaveStatus;

/// 编辑器事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum EditorEvent {
    /// 保存状态变更（指示器: idle / saving / saved / error）
    SaveStatusChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        book_id: Option<String>,
        status: SaveStatus,
    },
    /// 保存完成
    BookSaved {
        book_id: String,
        revision: u64,
        saved_at: DateTime<Utc>,
    },
    /// 保存失败（脏标记保留）
    SaveFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        book_id: Option<String>,
        error: String,
    },
    /// 网关为新书分配了 id
    BookCreated {
        book_id: String,
    },
}

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<EditorEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅编辑器事件
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.channel.subscribe()
    }

    /// 当前订阅者数量
    pub fn receiver_count(&self) -> usize {
        self.channel.receiver_count()
    }

    /// 发布保存状态变更事件
    pub fn publish_status(&self, book_id: Option<&str>, status: SaveStatus) {
        self.publish(EditorEvent::SaveStatusChanged {
            book_id: book_id.map(str::to_string),
            status,
        });
    }

    /// 发布保存完成事件
    pub fn publish_saved(&self, book_id: &str, revision: u64, saved_at: DateTime<Utc>) {
        self.publish(EditorEvent::BookSaved {
            book_id: book_id.to_string(),
            revision,
            saved_at,
        });
    }

    /// 发布保存失败事件
    pub fn publish_save_failed(&self, book_id: Option<&str>, error: &str) {
        self.publish(EditorEvent::SaveFailed {
            book_id: book_id.map(str::to_string),
            error: error.to_string(),
        });
    }

    /// 发布新书创建事件
    pub fn publish_book_created(&self, book_id: &str) {
        self.publish(EditorEvent::BookCreated {
            book_id: book_id.to_string(),
        });
    }

    fn publish(&self, event: EditorEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(
                error = %e,
                "Failed to publish editor event (no receivers)"
            );
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
