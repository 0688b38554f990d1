//! EPUB Builder Port - 导出
//!
//! 从规范化后的 Book 生成可下载的二进制产物。打包本身由外部实现

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::Book;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export failed: {0}")]
    BuildFailed(String),
}

/// 导出产物
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// EPUB Builder Port
#[async_trait]
pub trait EpubBuilderPort: Send + Sync {
    /// `book` 的章节已经过排版规范化
    async fn build(&self, book: &Book) -> Result<ExportArtifact, ExportError>;
}
