//! Persistence Layer - 数据持久化
//!
//! 本地 Sled 存储（偏好设置）

pub mod sled;

pub use self::sled::{SledPreferenceConfig, SledPreferenceStore};
