//! Book Context - Entities

use serde::{Deserialize, Serialize};

use super::{ChapterId, ChapterType};

/// 章节
///
/// 不变量:
/// - id 在 Book 内唯一
/// - content 是标签配平的 HTML 片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    title: String,
    content: String,
    #[serde(rename = "type", default)]
    chapter_type: ChapterType,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>, chapter_type: ChapterType) -> Self {
        Self::with_id(ChapterId::new(), title, content, chapter_type)
    }

    pub fn with_id(
        id: ChapterId,
        title: impl Into<String>,
        content: impl Into<String>,
        chapter_type: ChapterType,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            chapter_type,
        }
    }

    pub fn id(&self) -> &ChapterId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn chapter_type(&self) -> ChapterType {
        self.chapter_type
    }

    pub(super) fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub(super) fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub(super) fn set_chapter_type(&mut self, chapter_type: ChapterType) {
        self.chapter_type = chapter_type;
    }

    /// 复制为新章节（新 id）
    pub(super) fn duplicate(&self) -> Self {
        Self {
            id: ChapterId::new(),
            ..self.clone()
        }
    }
}
