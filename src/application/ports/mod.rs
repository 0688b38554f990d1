//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod book_gateway;
mod cover_processor;
mod epub_builder;
mod preferences;

pub use book_gateway::{BookGatewayPort, GatewayError};
pub use cover_processor::{
    CoverEncoding, CoverError, CoverFile, CoverOptions, CoverProcessorPort, ProcessedCover,
};
pub use epub_builder::{EpubBuilderPort, ExportArtifact, ExportError};
pub use preferences::{keys as preference_keys, PreferenceError, PreferenceStorePort, PreferenceValue};
