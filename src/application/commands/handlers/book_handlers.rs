//! Book Command Handlers

use std::sync::Arc;

use crate::application::commands::{CreateBook, DeleteBook, DuplicateBook, ExportBook, LoadBook};
use crate::application::error::ApplicationError;
use crate::application::ports::{BookGatewayPort, EpubBuilderPort, ExportArtifact};
use crate::domain::book::{Book, BookId};
use crate::domain::typography::TypographyNormalizer;

/// 新建/复制书籍的响应
#[derive(Debug, Clone)]
pub struct BookCreatedResponse {
    pub id: BookId,
    pub book: Book,
}

// ============================================================================
// CreateBook
// ============================================================================

/// CreateBook Handler
pub struct CreateBookHandler {
    gateway: Arc<dyn BookGatewayPort>,
}

impl CreateBookHandler {
    pub fn new(gateway: Arc<dyn BookGatewayPort>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, command: CreateBook) -> Result<BookCreatedResponse, ApplicationError> {
        let mut book = Book::new();
        if let Some(title) = command.title.filter(|t| !t.trim().is_empty()) {
            book.set_title(title)?;
        }
        if let Some(author) = command.author {
            book.set_author(author)?;
        }

        let id = self.gateway.create(&book).await?;
        book.assign_id(id.clone());

        tracing::info!(book_id = %id, title = %book.title(), "Book created");

        Ok(BookCreatedResponse { id, book })
    }
}

// ============================================================================
// LoadBook
// ============================================================================

/// LoadBook Handler
pub struct LoadBookHandler {
    gateway: Arc<dyn BookGatewayPort>,
}

impl LoadBookHandler {
    pub fn new(gateway: Arc<dyn BookGatewayPort>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, command: LoadBook) -> Result<Book, ApplicationError> {
        let mut book = self.gateway.fetch(&command.book_id).await?;
        if book.id().is_none() {
            book.assign_id(command.book_id.clone());
        }
        book.validate()?;

        tracing::info!(
            book_id = %command.book_id,
            chapters = book.chapters().len(),
            "Book loaded"
        );

        Ok(book)
    }
}

// ============================================================================
// DeleteBook
// ============================================================================

/// DeleteBook Handler
pub struct DeleteBookHandler {
    gateway: Arc<dyn BookGatewayPort>,
}

impl DeleteBookHandler {
    pub fn new(gateway: Arc<dyn BookGatewayPort>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, command: DeleteBook) -> Result<(), ApplicationError> {
        self.gateway.delete(&command.book_id).await?;
        tracing::info!(book_id = %command.book_id, "Book deleted");
        Ok(())
    }
}

// ============================================================================
// DuplicateBook
// ============================================================================

/// DuplicateBook Handler - 读取已保存的版本并另建一行
pub struct DuplicateBookHandler {
    gateway: Arc<dyn BookGatewayPort>,
}

impl DuplicateBookHandler {
    pub fn new(gateway: Arc<dyn BookGatewayPort>) -> Self {
        Self { gateway }
    }

    pub async fn handle(&self, command: DuplicateBook) -> Result<BookCreatedResponse, ApplicationError> {
        let source = self.gateway.fetch(&command.book_id).await?;
        let mut copy = source.duplicate();

        let id = self.gateway.create(&copy).await?;
        copy.assign_id(id.clone());

        tracing::info!(
            source_id = %command.book_id,
            book_id = %id,
            "Book duplicated"
        );

        Ok(BookCreatedResponse { id, book: copy })
    }
}

// ============================================================================
// ExportBook
// ============================================================================

/// 导出响应
#[derive(Debug, Clone)]
pub struct ExportBookResponse {
    pub artifact: ExportArtifact,
    /// 导出前规范化修改的次数
    pub typography_changes: usize,
}

/// ExportBook Handler - 先规范化再交给 EPUB 构建器
pub struct ExportBookHandler {
    builder: Arc<dyn EpubBuilderPort>,
    normalizer: TypographyNormalizer,
}

impl ExportBookHandler {
    pub fn new(builder: Arc<dyn EpubBuilderPort>, normalizer: TypographyNormalizer) -> Self {
        Self {
            builder,
            normalizer,
        }
    }

    pub async fn handle(&self, command: ExportBook) -> Result<ExportBookResponse, ApplicationError> {
        if command.book.chapters().is_empty() {
            return Err(ApplicationError::validation("Cannot export a book without chapters"));
        }

        let (normalized, report) = self.normalizer.normalize_book(&command.book);
        let artifact = self.builder.build(&normalized).await?;

        tracing::info!(
            book_id = ?command.book.id().map(|id| id.as_str()),
            file_name = %artifact.file_name,
            size = artifact.bytes.len(),
            typography_changes = report.total_changes,
            "Book exported"
        );

        Ok(ExportBookResponse {
            artifact,
            typography_changes: report.total_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ExportError;
    use crate::domain::book::{Chapter, ChapterType};
    use crate::infrastructure::adapters::InMemoryBookGateway;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// 把收到的书原样序列化为 JSON
    #[derive(Default)]
    struct JsonBuilder {
        received: Mutex<Option<Book>>,
    }

    #[async_trait]
    impl EpubBuilderPort for JsonBuilder {
        async fn build(&self, book: &Book) -> Result<ExportArtifact, ExportError> {
            *self.received.lock() = Some(book.clone());
            let bytes =
                serde_json::to_vec(book).map_err(|e| ExportError::BuildFailed(e.to_string()))?;
            Ok(ExportArtifact {
                file_name: format!("{}.epub", book.title()),
                mime_type: "application/epub+zip".to_string(),
                bytes,
            })
        }
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let gateway = InMemoryBookGateway::new().arc();
        let created = CreateBookHandler::new(gateway.clone())
            .handle(CreateBook {
                title: Some("Dune".to_string()),
                author: Some("Frank Herbert".to_string()),
            })
            .await
            .unwrap();

        let loaded = LoadBookHandler::new(gateway.clone())
            .handle(LoadBook {
                book_id: created.id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(loaded.id(), Some(&created.id));
        assert_eq!(loaded.title(), "Dune");
        assert_eq!(loaded.author(), "Frank Herbert");
    }

    #[tokio::test]
    async fn test_blank_title_keeps_default() {
        let gateway = InMemoryBookGateway::new().arc();
        let created = CreateBookHandler::new(gateway)
            .handle(CreateBook {
                title: Some("   ".to_string()),
                author: None,
            })
            .await
            .unwrap();
        assert_eq!(created.book.title(), Book::UNTITLED);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let gateway = InMemoryBookGateway::new().arc();
        let err = LoadBookHandler::new(gateway)
            .handle(LoadBook {
                book_id: BookId::from_string("nope"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { resource_type: "Book", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_creates_new_row() {
        let gateway = InMemoryBookGateway::new().arc();
        let created = CreateBookHandler::new(gateway.clone())
            .handle(CreateBook {
                title: Some("Original".to_string()),
                author: None,
            })
            .await
            .unwrap();

        let copy = DuplicateBookHandler::new(gateway.clone())
            .handle(DuplicateBook {
                book_id: created.id.clone(),
            })
            .await
            .unwrap();

        assert_ne!(copy.id, created.id);
        assert_eq!(copy.book.title(), "Original (Copy)");
        assert_eq!(gateway.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let gateway = InMemoryBookGateway::new().arc();
        let created = CreateBookHandler::new(gateway.clone())
            .handle(CreateBook::default())
            .await
            .unwrap();

        DeleteBookHandler::new(gateway.clone())
            .handle(DeleteBook {
                book_id: created.id,
            })
            .await
            .unwrap();
        assert!(gateway.is_empty());
    }

    #[tokio::test]
    async fn test_export_normalizes_before_building() {
        let builder = Arc::new(JsonBuilder::default());
        let handler = ExportBookHandler::new(builder.clone(), TypographyNormalizer::default());

        let mut book = Book::new();
        book.add_chapter(Chapter::new("One", "well--actually", ChapterType::Content))
            .unwrap();

        let response = handler.handle(ExportBook { book }).await.unwrap();

        assert_eq!(response.typography_changes, 1);
        assert_eq!(response.artifact.mime_type, "application/epub+zip");
        let received = builder.received.lock().clone().unwrap();
        assert_eq!(received.chapters()[0].content(), "well\u{2014}actually");
    }

    #[tokio::test]
    async fn test_export_requires_chapters() {
        let handler = ExportBookHandler::new(
            Arc::new(JsonBuilder::default()),
            TypographyNormalizer::default(),
        );
        let err = handler
            .handle(ExportBook { book: Book::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
    }
}
