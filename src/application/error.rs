//! 应用层错误定义
//!
//! 统一的命令/会话错误类型

use thiserror::Error;

use crate::application::ports::{ExportError, GatewayError, PreferenceError};
use crate::domain::book::BookError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 领域规则违反（分区锁定、章节不存在等）
    #[error(transparent)]
    Book(#[from] BookError),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 远端网关错误
    #[error("Gateway error: {0}")]
    GatewayError(String),

    /// 导出错误
    #[error("Export error: {0}")]
    ExportError(String),

    /// 本地偏好设置错误
    #[error("Preference error: {0}")]
    PreferenceError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<GatewayError> for ApplicationError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(id) => Self::not_found("Book", id),
            other => Self::GatewayError(other.to_string()),
        }
    }
}

impl From<ExportError> for ApplicationError {
    fn from(err: ExportError) -> Self {
        Self::ExportError(err.to_string())
    }
}

impl From<PreferenceError> for ApplicationError {
    fn from(err: PreferenceError) -> Self {
        Self::PreferenceError(err.to_string())
    }
}
