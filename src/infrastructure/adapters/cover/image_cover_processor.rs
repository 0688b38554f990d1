//! Image Cover Processor - 封面缩放与重新编码
//!
//! 解码 -> 等比缩小到上限以内（不放大）-> JPEG（源图带透明通道时用 PNG）-> data URL。
//! 任何一步失败都退回原始字节，不向调用方报错

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageFormat};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::application::ports::{
    CoverEncoding, CoverError, CoverFile, CoverOptions, CoverProcessorPort, ProcessedCover,
};
use crate::domain::book::CoverArtifact;

const FALLBACK_MIME: &str = "application/octet-stream";

/// 计算缩放后的尺寸: scale = min(maxW / w, maxH / h)，不放大
pub fn target_dimensions(width: u32, height: u32, options: &CoverOptions) -> (u32, u32) {
    if width <= options.max_width && height <= options.max_height {
        return (width, height);
    }
    let scale = f64::min(
        options.max_width as f64 / width as f64,
        options.max_height as f64 / height as f64,
    );
    let scaled = |side: u32, max: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    (
        scaled(width, options.max_width),
        scaled(height, options.max_height),
    )
}

/// 解码期间占用的临时资源
///
/// 创建时计数 +1，drop 时 -1，成功、失败、panic 都会释放
struct DecodeHandle {
    bytes: Arc<[u8]>,
    open: Arc<AtomicUsize>,
}

impl DecodeHandle {
    fn acquire(bytes: Arc<[u8]>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { bytes, open }
    }
}

impl Drop for DecodeHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Encoded {
    mime: &'static str,
    bytes: Vec<u8>,
    encoding: CoverEncoding,
    dimensions: (u32, u32),
}

/// 基于 `image` crate 的封面处理器
pub struct ImageCoverProcessor {
    options: CoverOptions,
    open_handles: Arc<AtomicUsize>,
}

impl ImageCoverProcessor {
    pub fn new(options: CoverOptions) -> Self {
        tracing::info!(
            max_width = options.max_width,
            max_height = options.max_height,
            jpeg_quality = options.jpeg_quality,
            "ImageCoverProcessor initialized"
        );
        Self {
            options,
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn options(&self) -> &CoverOptions {
        &self.options
    }

    /// 尚未释放的解码句柄数量
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    fn encode(handle: DecodeHandle, options: CoverOptions) -> Result<Encoded, CoverError> {
        let image = image::load_from_memory(&handle.bytes)
            .map_err(|e| CoverError::DecodingError(e.to_string()))?;

        let (width, height) = (image.width(), image.height());
        let (target_w, target_h) = target_dimensions(width, height, &options);
        let image = if (target_w, target_h) == (width, height) {
            image
        } else {
            image.resize_exact(target_w, target_h, FilterType::Triangle)
        };

        if image.color().has_alpha() {
            let bytes = encode_png(&image)?;
            Ok(Encoded {
                mime: "image/png",
                bytes,
                encoding: CoverEncoding::Png,
                dimensions: (target_w, target_h),
            })
        } else {
            let bytes = encode_jpeg(&image, options.jpeg_quality)?;
            Ok(Encoded {
                mime: "image/jpeg",
                bytes,
                encoding: CoverEncoding::Jpeg,
                dimensions: (target_w, target_h),
            })
        }
    }

    /// 原始字节的 MIME: 先看内容，再看扩展名
    fn sniff_mime(file_name: Option<&str>, bytes: &[u8]) -> &'static str {
        if let Ok(format) = image::guess_format(bytes) {
            return format.to_mime_type();
        }
        file_name
            .and_then(|name| ImageFormat::from_path(Path::new(name)).ok())
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME)
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CoverError> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| CoverError::EncodingError(e.to_string()))?;
    Ok(out)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CoverError> {
    let rgba = image.to_rgba8();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| CoverError::EncodingError(e.to_string()))?;
    Ok(out)
}

#[async_trait]
impl CoverProcessorPort for ImageCoverProcessor {
    async fn process(&self, file: CoverFile) -> ProcessedCover {
        let original_size = file.bytes.len();
        let bytes: Arc<[u8]> = Arc::from(file.bytes);
        let handle = DecodeHandle::acquire(bytes.clone(), self.open_handles.clone());
        let options = self.options;

        let result = tokio::task::spawn_blocking(move || Self::encode(handle, options))
            .await
            .map_err(|e| CoverError::TaskError(e.to_string()))
            .and_then(|r| r);

        match result {
            Ok(encoded) => {
                tracing::info!(
                    file_name = ?file.file_name,
                    width = encoded.dimensions.0,
                    height = encoded.dimensions.1,
                    original_size = original_size,
                    encoded_size = encoded.bytes.len(),
                    mime = encoded.mime,
                    "Cover processed"
                );
                ProcessedCover {
                    artifact: CoverArtifact::from_bytes(encoded.mime, &encoded.bytes),
                    encoding: encoded.encoding,
                    dimensions: Some(encoded.dimensions),
                    original_size,
                    encoded_size: encoded.bytes.len(),
                }
            }
            Err(e) => {
                let mime = Self::sniff_mime(file.file_name.as_deref(), &bytes);
                tracing::warn!(
                    file_name = ?file.file_name,
                    original_size = original_size,
                    mime = mime,
                    error = %e,
                    "Cover processing failed, storing original bytes"
                );
                ProcessedCover {
                    artifact: CoverArtifact::from_bytes(mime, &bytes),
                    encoding: CoverEncoding::Passthrough,
                    dimensions: None,
                    original_size,
                    encoded_size: original_size,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn decoded(cover: &ProcessedCover) -> DynamicImage {
        let bytes = cover.artifact.decode().unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_target_dimensions() {
        let options = CoverOptions::default();
        assert_eq!(target_dimensions(4000, 6000, &options), (1200, 1800));
        assert_eq!(target_dimensions(3000, 1000, &options), (1200, 400));
        assert_eq!(target_dimensions(800, 600, &options), (800, 600));
        assert_eq!(target_dimensions(1200, 5400, &options), (400, 1800));
    }

    #[tokio::test]
    async fn test_large_cover_is_bounded_and_keeps_aspect() {
        let processor = ImageCoverProcessor::new(CoverOptions::default());
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(4000, 6000, Rgb([200, 40, 40])));

        let cover = processor
            .process(CoverFile::new("cover.png", png_bytes(source)))
            .await;

        assert_eq!(cover.encoding, CoverEncoding::Jpeg);
        assert_eq!(cover.artifact.mime_type(), Some("image/jpeg"));
        let image = decoded(&cover);
        assert!(image.width() <= 1200 && image.height() <= 1800);
        let ratio = image.width() as f64 / image.height() as f64;
        assert!((ratio - 4000.0 / 6000.0).abs() < 0.01);
        assert_eq!(processor.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_transparent_cover_stays_lossless() {
        let processor = ImageCoverProcessor::new(CoverOptions::default());
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([0, 0, 0, 0])));

        let cover = processor
            .process(CoverFile::from_bytes(png_bytes(source)))
            .await;

        assert_eq!(cover.encoding, CoverEncoding::Png);
        assert_eq!(cover.dimensions, Some((64, 32)));
        assert!(decoded(&cover).color().has_alpha());
    }

    #[tokio::test]
    async fn test_garbage_falls_back_to_original_bytes() {
        let processor = ImageCoverProcessor::new(CoverOptions::default());
        let garbage = b"definitely not an image".to_vec();

        let cover = processor
            .process(CoverFile::new("cover.webp", garbage.clone()))
            .await;

        assert_eq!(cover.encoding, CoverEncoding::Passthrough);
        assert_eq!(cover.artifact.decode().unwrap(), garbage);
        assert_eq!(cover.artifact.mime_type(), Some("image/webp"));
        assert_eq!(processor.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_unknown_extension_uses_octet_stream() {
        let processor = ImageCoverProcessor::new(CoverOptions::default());

        let cover = processor
            .process(CoverFile::new("cover.xyz", vec![1, 2, 3]))
            .await;

        assert_eq!(cover.artifact.mime_type(), Some(FALLBACK_MIME));
    }

    #[test]
    fn test_truncated_png_is_sniffed_as_png() {
        let bytes = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(4, 4)));
        let truncated = &bytes[..16];
        assert_eq!(ImageCoverProcessor::sniff_mime(None, truncated), "image/png");
    }
}
