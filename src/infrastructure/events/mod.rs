//! Events - 编辑器事件广播

mod publisher;

pub use publisher::{EditorEvent, EventPublisher};
