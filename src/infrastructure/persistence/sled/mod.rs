//! Sled 嵌入式存储

mod preferences;

pub use preferences::{SledPreferenceConfig, SledPreferenceStore};
