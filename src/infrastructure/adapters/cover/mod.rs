//! Cover Adapter - 封面图片处理实现

mod image_cover_processor;

pub use image_cover_processor::{target_dimensions, ImageCoverProcessor};
