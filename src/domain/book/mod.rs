//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - Book 聚合（元数据 + 有序章节）
//! - 章节实体
//! - 分区锁

mod aggregate;
mod entities;
mod errors;
mod locks;
mod value_objects;

pub use aggregate::Book;
pub use entities::Chapter;
pub use errors::BookError;
pub use locks::{LockedSections, Section};
pub use value_objects::{BookId, ChapterId, ChapterType, CoverArtifact};
