//! Preference Store Port - 本地偏好设置
//!
//! 非权威的键值存储（面板宽度、上次使用的防抖间隔等），不属于 Book 的持久化保证

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 偏好设置错误
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 已知的偏好键
pub mod keys {
    /// 侧边栏宽度（像素）
    pub const PANEL_WIDTH: &str = "editor.panel_width";
    /// 上次使用的自动保存防抖间隔（毫秒）
    pub const AUTOSAVE_INTERVAL_MS: &str = "autosave.interval_ms";
}

/// 偏好值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreferenceValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl PreferenceValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PreferenceValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PreferenceValue::Float(v) => Some(*v),
            PreferenceValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PreferenceValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PreferenceValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Preference Store Port
pub trait PreferenceStorePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<PreferenceValue>, PreferenceError>;

    fn set(&self, key: &str, value: PreferenceValue) -> Result<(), PreferenceError>;

    fn remove(&self, key: &str) -> Result<(), PreferenceError>;
}
