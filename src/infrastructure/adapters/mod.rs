//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod cover;
pub mod gateway;

pub use cover::*;
pub use gateway::*;
