//! HTTP Book Gateway - 调用远端书籍存储服务
//!
//! 实现 BookGatewayPort trait，整本 Book 以 JSON 提交
//!
//! 远端 API:
//! POST   {base}/books        Request: Book JSON  Response: {"id": "..."}
//! PUT    {base}/books/{id}   Request: Book JSON
//! GET    {base}/books/{id}   Response: Book JSON
//! DELETE {base}/books/{id}

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::{BookGatewayPort, GatewayError};
use crate::domain::book::{Book, BookId};

/// 创建响应体
#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// HTTP 网关配置
#[derive(Debug, Clone)]
pub struct HttpBookGatewayConfig {
    /// 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpBookGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpBookGatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 书籍网关
pub struct HttpBookGateway {
    client: Client,
    books_url: Url,
}

impl HttpBookGateway {
    pub fn new(config: HttpBookGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let raw = format!("{}/books", config.base_url.trim_end_matches('/'));
        let books_url = Url::parse(&raw)
            .map_err(|e| GatewayError::NetworkError(format!("Invalid base url {}: {}", raw, e)))?;
        if books_url.cannot_be_a_base() {
            return Err(GatewayError::NetworkError(format!(
                "Base url cannot carry a path: {}",
                raw
            )));
        }

        Ok(Self { client, books_url })
    }

    fn books_url(&self) -> Url {
        self.books_url.clone()
    }

    /// id 作为单个路径段追加，其中的 `/`、空格等字符会被百分号编码
    fn book_url(&self, id: &BookId) -> Url {
        let mut url = self.books_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::NetworkError(format!("Cannot connect to book service: {}", e))
    } else {
        GatewayError::NetworkError(e.to_string())
    }
}

/// 非 2xx 响应映射为网关错误
async fn check_status(response: Response, id: Option<&BookId>) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, id, &body))
}

fn status_error(status: StatusCode, id: Option<&BookId>, body: &str) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
        StatusCode::NOT_FOUND => {
            GatewayError::NotFound(id.map(|id| id.to_string()).unwrap_or_default())
        }
        _ => GatewayError::ServerError(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl BookGatewayPort for HttpBookGateway {
    async fn create(&self, book: &Book) -> Result<BookId, GatewayError> {
        tracing::debug!(url = %self.books_url(), chapters = book.chapters().len(), "Creating book");

        let response = self
            .client
            .post(self.books_url())
            .json(book)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, None).await?;

        let created: CreatedResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;

        tracing::info!(book_id = %created.id, "Book created on remote");
        Ok(BookId::from_string(created.id))
    }

    async fn update(&self, id: &BookId, book: &Book) -> Result<(), GatewayError> {
        tracing::debug!(url = %self.book_url(id), chapters = book.chapters().len(), "Updating book");

        let response = self
            .client
            .put(self.book_url(id))
            .json(book)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn fetch(&self, id: &BookId) -> Result<Book, GatewayError> {
        let response = self
            .client
            .get(self.book_url(id))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response, Some(id)).await?;

        let mut book: Book = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        if book.id().is_none() {
            book.assign_id(id.clone());
        }
        book.validate()
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        Ok(book)
    }

    async fn delete(&self, id: &BookId) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.book_url(id))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, Some(id)).await?;
        tracing::info!(book_id = %id, "Book deleted on remote");
        Ok(())
    }
}
