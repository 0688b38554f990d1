//! Cover Processor Port - 封面图片处理
//!
//! 把任意用户图片转换为尺寸受限、可持久化的 data URL

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::CoverArtifact;

/// 封面处理错误
///
/// 只在处理器内部流转；对外一律降级为原始字节
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Task error: {0}")]
    TaskError(String),
}

/// 封面尺寸与质量限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG 质量 (1-100)
    pub jpeg_quality: u8,
}

impl Default for CoverOptions {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 1800,
            jpeg_quality: 85,
        }
    }
}

/// 用户上传的文件
#[derive(Debug, Clone)]
pub struct CoverFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl CoverFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            bytes,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            bytes,
        }
    }
}

/// 产物编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverEncoding {
    /// 有损（默认）
    Jpeg,
    /// 无损（源图带透明通道）
    Png,
    /// 处理失败，原始字节
    Passthrough,
}

/// 处理结果
#[derive(Debug, Clone)]
pub struct ProcessedCover {
    pub artifact: CoverArtifact,
    pub encoding: CoverEncoding,
    /// 输出尺寸（Passthrough 时未知）
    pub dimensions: Option<(u32, u32)>,
    pub original_size: usize,
    pub encoded_size: usize,
}

/// Cover Processor Port
#[async_trait]
pub trait CoverProcessorPort: Send + Sync {
    /// 处理封面。不会失败: 解码或编码出错时返回原始字节
    async fn process(&self, file: CoverFile) -> ProcessedCover;
}
