//! In-Memory Book Gateway - 离线会话与测试用
//!
//! 行为与远端一致（create 分配 id，update 要求 id 已存在），
//! 另外支持注入延迟和失败，并统计调用次数

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{BookGatewayPort, GatewayError};
use crate::domain::book::{Book, BookId};

/// 可注入的失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Unauthorized,
    ServerError,
    Network,
    Timeout,
}

impl InjectedFailure {
    fn to_error(self) -> GatewayError {
        match self {
            InjectedFailure::Unauthorized => GatewayError::Unauthorized,
            InjectedFailure::ServerError => GatewayError::ServerError("injected failure".to_string()),
            InjectedFailure::Network => GatewayError::NetworkError("injected failure".to_string()),
            InjectedFailure::Timeout => GatewayError::Timeout,
        }
    }
}

/// 内存书籍网关
pub struct InMemoryBookGateway {
    books: DashMap<String, Book>,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
    failure: Mutex<Option<InjectedFailure>>,
}

impl InMemoryBookGateway {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            latency: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 每次调用前等待 `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// 之后的所有调用都以 `failure` 失败，`None` 恢复正常
    pub fn fail_with(&self, failure: Option<InjectedFailure>) {
        *self.failure.lock() = failure;
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// create + update 的总次数
    pub fn save_calls(&self) -> usize {
        self.create_calls() + self.update_calls()
    }

    /// 最近一次收到的负载
    pub fn stored(&self, id: &BookId) -> Option<Book> {
        self.books.get(id.as_str()).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    async fn simulate(&self) -> Result<(), GatewayError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let failure = *self.failure.lock();
        match failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryBookGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookGatewayPort for InMemoryBookGateway {
    async fn create(&self, book: &Book) -> Result<BookId, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let id = BookId::new();
        let mut stored = book.clone();
        stored.assign_id(id.clone());
        self.books.insert(id.as_str().to_string(), stored);

        tracing::debug!(book_id = %id, "Book created in memory");
        Ok(id)
    }

    async fn update(&self, id: &BookId, book: &Book) -> Result<(), GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let mut entry = self
            .books
            .get_mut(id.as_str())
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        let mut stored = book.clone();
        stored.assign_id(id.clone());
        *entry = stored;

        tracing::debug!(book_id = %id, "Book updated in memory");
        Ok(())
    }

    async fn fetch(&self, id: &BookId) -> Result<Book, GatewayError> {
        self.simulate().await?;
        self.stored(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &BookId) -> Result<(), GatewayError> {
        self.simulate().await?;
        self.books
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update() {
        let gateway = InMemoryBookGateway::new();
        let mut book = Book::new();
        book.set_title("Draft").unwrap();

        let id = gateway.create(&book).await.unwrap();
        assert_eq!(gateway.stored(&id).unwrap().id(), Some(&id));

        book.set_title("Final").unwrap();
        gateway.update(&id, &book).await.unwrap();

        let fetched = gateway.fetch(&id).await.unwrap();
        assert_eq!(fetched.title(), "Final");
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(gateway.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let gateway = InMemoryBookGateway::new();
        let err = gateway
            .update(&BookId::from_string("missing"), &Book::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_injected_failure_still_counts_call() {
        let gateway = InMemoryBookGateway::new();
        gateway.fail_with(Some(InjectedFailure::Unauthorized));

        let err = gateway.create(&Book::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized));
        assert_eq!(gateway.create_calls(), 1);
        assert!(gateway.is_empty());

        gateway.fail_with(None);
        assert!(gateway.create(&Book::new()).await.is_ok());
        assert_eq!(gateway.len(), 1);
    }
}
