//! Autosave Scheduler - 防抖自动保存
//!
//! 文档变更 -> 标脏 -> 防抖定时器 -> 规范化负载 -> 网关。
//! 保存单飞执行；失败时保留脏标记，等下一次编辑重新调度

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::debounce::DebounceTimer;
use super::in_flight::InFlight;
use crate::application::ports::{BookGatewayPort, GatewayError};
use crate::domain::book::{Book, BookId, ChapterId};
use crate::domain::typography::TypographyNormalizer;
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::memory::{DocumentObserver, DocumentStore};

/// 防抖间隔下限
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);
/// 防抖间隔上限
pub const MAX_INTERVAL: Duration = Duration::from_secs(30);

/// 自动保存配置
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// 最后一次编辑后的静默时间
    pub interval: Duration,
    /// `saved` 状态保持时间
    pub saved_display: Duration,
    /// `error` 状态保持时间
    pub error_display: Duration,
    pub enabled: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            saved_display: Duration::from_secs(2),
            error_display: Duration::from_secs(3),
            enabled: true,
        }
    }
}

impl AutosaveConfig {
    /// 把间隔限制在 [10s, 30s]
    pub fn clamp_interval(interval: Duration) -> Duration {
        interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
    }
}

/// 保存状态指示器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 保存状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub is_dirty: bool,
    pub is_saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub status: SaveStatus,
}

/// 跳过保存的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotDirty,
    Disabled,
    InFlight,
    TornDown,
}

/// 一次保存尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        book_id: BookId,
        revision: u64,
        /// 保存期间又有新的编辑
        still_dirty: bool,
    },
    Failed {
        error: String,
    },
    Skipped(SkipReason),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// 章节负载缓存项
struct CachedChapter {
    digest: md5::Digest,
    normalized: String,
}

/// 自动保存调度器
///
/// 必须在 tokio 运行时中创建。定时器只持有调度器的弱引用；
/// 已开始的保存在独立任务中运行，不会被 teardown 打断
pub struct AutosaveScheduler {
    store: Arc<DocumentStore>,
    gateway: Arc<dyn BookGatewayPort>,
    events: Arc<EventPublisher>,
    normalizer: TypographyNormalizer,
    interval: Mutex<Duration>,
    saved_display: Duration,
    error_display: Duration,
    enabled: AtomicBool,
    torn_down: AtomicBool,
    state: Mutex<SaveState>,
    in_flight: InFlight,
    save_timer: DebounceTimer,
    status_timer: DebounceTimer,
    payload_cache: Mutex<HashMap<ChapterId, CachedChapter>>,
    this: Weak<Self>,
}

impl AutosaveScheduler {
    /// 创建调度器并订阅文档变更
    pub fn new(
        config: AutosaveConfig,
        store: Arc<DocumentStore>,
        gateway: Arc<dyn BookGatewayPort>,
        events: Arc<EventPublisher>,
        normalizer: TypographyNormalizer,
    ) -> Arc<Self> {
        let interval = AutosaveConfig::clamp_interval(config.interval);
        let scheduler = Arc::new_cyclic(|this| Self {
            store: store.clone(),
            gateway,
            events,
            normalizer,
            interval: Mutex::new(interval),
            saved_display: config.saved_display,
            error_display: config.error_display,
            enabled: AtomicBool::new(config.enabled),
            torn_down: AtomicBool::new(false),
            state: Mutex::new(SaveState::default()),
            in_flight: InFlight::new(),
            save_timer: DebounceTimer::new(),
            status_timer: DebounceTimer::new(),
            payload_cache: Mutex::new(HashMap::new()),
            this: this.clone(),
        });

        let observer: Arc<dyn DocumentObserver> = scheduler.clone();
        store.subscribe(Arc::downgrade(&observer));

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            enabled = config.enabled,
            "AutosaveScheduler started"
        );
        scheduler
    }

    // ========================================================================
    // 状态查询
    // ========================================================================

    pub fn state(&self) -> SaveState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.state.lock().status
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().is_dirty
    }

    pub fn is_saving(&self) -> bool {
        self.state.lock().is_saving
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 是否有待触发的自动保存
    pub fn is_scheduled(&self) -> bool {
        self.save_timer.is_armed()
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    // ========================================================================
    // 调度
    // ========================================================================

    /// 标记有未保存的修改，并重新开始防抖计时
    pub fn mark_dirty(&self) {
        if self.is_torn_down() {
            return;
        }

        let reset_status = {
            let mut state = self.state.lock();
            state.is_dirty = true;
            if !state.is_saving && state.status != SaveStatus::Idle {
                state.status = SaveStatus::Idle;
                true
            } else {
                false
            }
        };
        if reset_status {
            self.status_timer.cancel();
            self.publish_status(SaveStatus::Idle);
        }

        self.schedule_save();
    }

    /// 有未保存修改时（重新）启动防抖定时器
    pub fn schedule_save(&self) {
        if self.is_torn_down() || !self.is_enabled() || !self.is_dirty() {
            return;
        }

        let interval = self.interval();
        let this = self.this.clone();
        self.save_timer.arm(interval, move || {
            if let Some(scheduler) = this.upgrade() {
                scheduler.trigger_save();
            }
        });
        tracing::trace!(interval_ms = interval.as_millis() as u64, "Autosave scheduled");
    }

    /// 修改防抖间隔（会被限制在允许范围内），返回实际生效值
    pub fn set_interval(&self, interval: Duration) -> Duration {
        let interval = AutosaveConfig::clamp_interval(interval);
        *self.interval.lock() = interval;
        if self.save_timer.is_armed() {
            self.schedule_save();
        }
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Autosave interval changed");
        interval
    }

    /// 开关自动保存。关闭时取消待触发的保存，打开时若有脏数据立即重新调度
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            self.schedule_save();
        } else {
            self.save_timer.cancel();
        }
        tracing::debug!(enabled = enabled, "Autosave toggled");
    }

    /// 停止调度。已开始的保存继续完成，之后不会再触发新的保存
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.save_timer.cancel();
        self.status_timer.cancel();
        tracing::info!(
            pending_cancelled = cancelled,
            dirty = self.is_dirty(),
            "AutosaveScheduler torn down"
        );
    }

    // ========================================================================
    // 保存
    // ========================================================================

    /// 在独立任务中立即保存，不等待结果
    pub fn trigger_save(&self) {
        if let Some(scheduler) = self.this.upgrade() {
            tokio::spawn(async move {
                scheduler.save().await;
            });
        }
    }

    /// 立即保存当前文档
    ///
    /// 未标脏、已关闭或已有保存在进行时直接跳过
    pub async fn save(&self) -> SaveOutcome {
        if self.is_torn_down() {
            return SaveOutcome::Skipped(SkipReason::TornDown);
        }
        if !self.is_enabled() {
            return SaveOutcome::Skipped(SkipReason::Disabled);
        }
        if !self.is_dirty() {
            return SaveOutcome::Skipped(SkipReason::NotDirty);
        }
        let Some(guard) = self.in_flight.try_acquire() else {
            tracing::debug!("Save already in flight, skipping");
            return SaveOutcome::Skipped(SkipReason::InFlight);
        };

        self.save_timer.cancel();
        self.set_saving();

        let snapshot = self.store.snapshot();
        let book_id = snapshot.book.id().cloned();
        let payload = self.prepare_payload(snapshot.book);
        let started = Instant::now();

        let result = self.persist(&payload).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(book_id) => {
                let still_dirty = self.finish_success(&book_id, snapshot.revision);
                tracing::info!(
                    book_id = %book_id,
                    revision = snapshot.revision,
                    elapsed_ms = elapsed_ms,
                    still_dirty = still_dirty,
                    "Book saved"
                );
                SaveOutcome::Saved {
                    book_id,
                    revision: snapshot.revision,
                    still_dirty,
                }
            }
            Err(e) => {
                self.finish_failure(book_id.as_ref(), &e);
                tracing::warn!(
                    book_id = ?book_id.as_ref().map(|id| id.as_str()),
                    revision = snapshot.revision,
                    elapsed_ms = elapsed_ms,
                    error = %e,
                    "Autosave failed, changes kept dirty"
                );
                SaveOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        drop(guard);
        if let SaveOutcome::Saved { still_dirty: true, .. } = outcome {
            self.schedule_save();
        }
        outcome
    }

    /// 无 id 时新建，否则整体更新
    async fn persist(&self, payload: &Book) -> Result<BookId, GatewayError> {
        match payload.id() {
            Some(id) => {
                self.gateway.update(id, payload).await?;
                Ok(id.clone())
            }
            None => {
                let id = self.gateway.create(payload).await?;
                self.store.assign_id(id.clone());
                self.events.publish_book_created(id.as_str());
                tracing::info!(book_id = %id, "Book created");
                Ok(id)
            }
        }
    }

    /// 生成规范化后的负载，只重新规范化内容有变化的章节
    fn prepare_payload(&self, mut book: Book) -> Book {
        let mut cache = self.payload_cache.lock();
        let mut fresh = HashMap::with_capacity(book.chapters().len());
        let mut normalized = 0usize;

        book.rewrite_chapter_contents(|chapter| {
            let raw = chapter.content();
            let digest = md5::compute(raw.as_bytes());
            let content = match cache.get(chapter.id()) {
                Some(cached) if cached.digest == digest => cached.normalized.clone(),
                _ => {
                    normalized += 1;
                    self.normalizer.normalize(raw).content
                }
            };
            let rewritten = (content != raw).then(|| content.clone());
            fresh.insert(
                chapter.id().clone(),
                CachedChapter {
                    digest,
                    normalized: content,
                },
            );
            rewritten
        });

        tracing::debug!(
            chapters = fresh.len(),
            normalized = normalized,
            "Save payload prepared"
        );
        *cache = fresh;
        book
    }

    fn set_saving(&self) {
        {
            let mut state = self.state.lock();
            state.is_saving = true;
            state.status = SaveStatus::Saving;
        }
        self.status_timer.cancel();
        self.publish_status(SaveStatus::Saving);
    }

    /// 返回保存期间是否又有新的编辑
    fn finish_success(&self, book_id: &BookId, revision: u64) -> bool {
        let saved_at = Utc::now();
        let still_dirty = {
            let mut state = self.state.lock();
            // revision 必须在 state 锁内比较，否则并发的 mark_dirty 会被覆盖
            let still_dirty = self.store.revision() != revision;
            state.is_saving = false;
            state.is_dirty = still_dirty;
            state.last_saved = Some(saved_at);
            state.status = SaveStatus::Saved;
            still_dirty
        };
        self.publish_status(SaveStatus::Saved);
        self.events.publish_saved(book_id.as_str(), revision, saved_at);
        self.revert_status_after(SaveStatus::Saved, self.saved_display);
        still_dirty
    }

    fn finish_failure(&self, book_id: Option<&BookId>, error: &GatewayError) {
        {
            let mut state = self.state.lock();
            state.is_saving = false;
            state.status = SaveStatus::Error;
        }
        self.publish_status(SaveStatus::Error);
        self.events
            .publish_save_failed(book_id.map(|id| id.as_str()), &error.to_string());
        self.revert_status_after(SaveStatus::Error, self.error_display);
    }

    /// `delay` 后若状态仍为 `expected`，回到 idle
    fn revert_status_after(&self, expected: SaveStatus, delay: Duration) {
        if self.is_torn_down() {
            return;
        }
        let this = self.this.clone();
        self.status_timer.arm(delay, move || {
            if let Some(scheduler) = this.upgrade() {
                scheduler.revert_status(expected);
            }
        });
    }

    fn revert_status(&self, expected: SaveStatus) {
        let reverted = {
            let mut state = self.state.lock();
            if state.status == expected {
                state.status = SaveStatus::Idle;
                true
            } else {
                false
            }
        };
        if reverted {
            self.publish_status(SaveStatus::Idle);
        }
    }

    fn publish_status(&self, status: SaveStatus) {
        let book_id = self.store.book_id();
        self.events
            .publish_status(book_id.as_ref().map(|id| id.as_str()), status);
    }
}

impl DocumentObserver for AutosaveScheduler {
    fn document_changed(&self, revision: u64) {
        tracing::trace!(revision = revision, "Document changed");
        self.mark_dirty();
    }
}
