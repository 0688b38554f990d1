//! Memory Layer - In-Memory State Management
//!
//! 当前文档的内存存储，以及内存版偏好设置

mod document_store;
mod preferences;

pub use document_store::{DocumentObserver, DocumentSnapshot, DocumentStore};
pub use preferences::InMemoryPreferenceStore;
