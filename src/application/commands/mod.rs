//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：书籍的创建、加载、删除、复制与导出

mod book_commands;

pub mod handlers;

pub use book_commands::*;
