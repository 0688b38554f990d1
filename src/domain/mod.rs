//! Domain Layer - 领域层
//!
//! - Book Context: 书籍聚合、章节、分区锁
//! - Typography: 章节 HTML 的排版规范化（纯函数）

pub mod book;
pub mod typography;

pub use typography::{
    check_typography, fix_chapters, normalize, BatchReport, ChapterFix, IssueCounts, Normalized,
    TypographyIssue, TypographyNormalizer, TypographyOptions,
};
