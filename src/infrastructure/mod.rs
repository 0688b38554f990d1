//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现以及编辑会话的装配

pub mod adapters;
pub mod editor;
pub mod events;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use editor::{EditorDeps, EditorSession};
pub use events::{EditorEvent, EventPublisher};
pub use memory::DocumentStore;
pub use worker::AutosaveScheduler;
