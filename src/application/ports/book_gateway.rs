//! Book Gateway Port - 远端持久化网关
//!
//! 以完整的 Book JSON 为负载，按 id 读写。具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::{Book, BookId};

/// 网关错误
///
/// 自动保存只关心成功与否，这里的区分仅用于日志和命令处理器
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthorized: no valid session")]
    Unauthorized,

    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Book Gateway Port
#[async_trait]
pub trait BookGatewayPort: Send + Sync {
    /// 新建一行，返回服务端分配的 id
    async fn create(&self, book: &Book) -> Result<BookId, GatewayError>;

    /// 整体覆盖更新（相同负载重复提交是幂等的）
    async fn update(&self, id: &BookId, book: &Book) -> Result<(), GatewayError>;

    /// 按 id 读取
    async fn fetch(&self, id: &BookId) -> Result<Book, GatewayError>;

    /// 删除
    async fn delete(&self, id: &BookId) -> Result<(), GatewayError>;
}
