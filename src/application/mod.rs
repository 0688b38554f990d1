//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BookGateway、CoverProcessor、EpubBuilder、PreferenceStore）
//! - commands: CQRS 命令及处理器
//! - shortcuts: 键盘快捷键分发
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod shortcuts;

// Re-exports
pub use commands::{
    CreateBook,
    DeleteBook,
    DuplicateBook,
    ExportBook,
    LoadBook,
    // Handlers
    handlers::{
        BookCreatedResponse, CreateBookHandler, DeleteBookHandler, DuplicateBookHandler,
        ExportBookHandler, ExportBookResponse, LoadBookHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    // Book gateway
    BookGatewayPort,
    GatewayError,
    // Cover processor
    CoverEncoding,
    CoverError,
    CoverFile,
    CoverOptions,
    CoverProcessorPort,
    ProcessedCover,
    // EPUB builder
    EpubBuilderPort,
    ExportArtifact,
    ExportError,
    // Preferences
    preference_keys,
    PreferenceError,
    PreferenceStorePort,
    PreferenceValue,
};

pub use shortcuts::{EditorAction, FocusContext, KeyEvent, ShortcutBinding, ShortcutDispatcher};
