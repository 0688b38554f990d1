//! Book Context - Errors

use thiserror::Error;

use super::{ChapterId, Section};

#[derive(Debug, Error)]
pub enum BookError {
    #[error("Section is locked: {0}")]
    SectionLocked(Section),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(ChapterId),

    #[error("Duplicate chapter id: {0}")]
    DuplicateChapter(ChapterId),

    #[error("Chapter index {index} out of range (len {len})")]
    InvalidChapterIndex { index: usize, len: usize },

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),
}
