//! Book Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::{BookError, BookId, Chapter, ChapterId, ChapterType, CoverArtifact, LockedSections, Section};

/// Book 聚合根
///
/// 不变量:
/// - 章节 id 在书内唯一
/// - 章节顺序即阅读顺序
/// - 被锁定分区的字段不可修改（读取不受限）
///
/// 所有 setter 返回 `Ok(true)` 表示状态确实发生了变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<BookId>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    isbn: String,
    #[serde(default)]
    cover_artifact: Option<CoverArtifact>,
    #[serde(default)]
    chapters: Vec<Chapter>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    locked_sections: LockedSections,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    pub const UNTITLED: &'static str = "Untitled Book";

    /// 新建空书（尚未分配 id）
    pub fn new() -> Self {
        Self {
            id: None,
            title: Self::UNTITLED.to_string(),
            author: String::new(),
            publisher: String::new(),
            isbn: String::new(),
            cover_artifact: None,
            chapters: Vec::new(),
            tags: BTreeSet::new(),
            locked_sections: LockedSections::default(),
            updated_at: Utc::now(),
        }
    }

    /// 校验从外部载入的数据
    pub fn validate(&self) -> Result<(), BookError> {
        let mut seen = HashSet::with_capacity(self.chapters.len());
        for chapter in &self.chapters {
            if !seen.insert(chapter.id()) {
                return Err(BookError::DuplicateChapter(chapter.id().clone()));
            }
        }
        Ok(())
    }

    /// 复制为新书: 无 id，标题加后缀，章节换新 id
    pub fn duplicate(&self) -> Self {
        Self {
            id: None,
            title: format!("{} (Copy)", self.title),
            chapters: self.chapters.iter().map(Chapter::duplicate).collect(),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn id(&self) -> Option<&BookId> {
        self.id.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn cover(&self) -> Option<&CoverArtifact> {
        self.cover_artifact.as_ref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, id: &ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn locked_sections(&self) -> &LockedSections {
        &self.locked_sections
    }

    pub fn is_locked(&self, section: Section) -> bool {
        self.locked_sections.is_locked(section)
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ------------------------------------------------------------------
    // 不受锁控制的操作
    // ------------------------------------------------------------------

    /// 记录网关分配的 id
    pub fn assign_id(&mut self, id: BookId) {
        self.id = Some(id);
    }

    /// 翻转分区锁，返回新状态
    pub fn toggle_lock(&mut self, section: Section) -> bool {
        self.locked_sections.toggle(section)
    }

    /// 重写章节正文，用于生成保存/导出负载（不经过锁检查，不更新 updated_at）
    ///
    /// `rewrite` 返回 `None` 表示保持原样
    pub fn rewrite_chapter_contents<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(&Chapter) -> Option<String>,
    {
        for chapter in &mut self.chapters {
            if let Some(content) = rewrite(chapter) {
                chapter.set_content(content);
            }
        }
    }

    // ------------------------------------------------------------------
    // bookInfo
    // ------------------------------------------------------------------

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::BookInfo)?;
        Ok(replace_if_changed(&mut self.title, title.into()) && self.touch())
    }

    pub fn set_author(&mut self, author: impl Into<String>) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::BookInfo)?;
        Ok(replace_if_changed(&mut self.author, author.into()) && self.touch())
    }

    // ------------------------------------------------------------------
    // publishing
    // ------------------------------------------------------------------

    pub fn set_publisher(&mut self, publisher: impl Into<String>) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Publishing)?;
        Ok(replace_if_changed(&mut self.publisher, publisher.into()) && self.touch())
    }

    pub fn set_isbn(&mut self, isbn: impl Into<String>) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Publishing)?;
        Ok(replace_if_changed(&mut self.isbn, isbn.into()) && self.touch())
    }

    // ------------------------------------------------------------------
    // tags
    // ------------------------------------------------------------------

    pub fn add_tag(&mut self, tag: &str) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Tags)?;
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(BookError::InvalidTag(tag.to_string()));
        }
        Ok(self.tags.insert(tag.to_string()) && self.touch())
    }

    pub fn remove_tag(&mut self, tag: &str) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Tags)?;
        Ok(self.tags.remove(tag.trim()) && self.touch())
    }

    // ------------------------------------------------------------------
    // cover
    // ------------------------------------------------------------------

    pub fn set_cover(&mut self, cover: Option<CoverArtifact>) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Cover)?;
        if self.cover_artifact == cover {
            return Ok(false);
        }
        self.cover_artifact = cover;
        Ok(self.touch())
    }

    // ------------------------------------------------------------------
    // chapters
    // ------------------------------------------------------------------

    pub fn add_chapter(&mut self, chapter: Chapter) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Chapters)?;
        if self.chapter(chapter.id()).is_some() {
            return Err(BookError::DuplicateChapter(chapter.id().clone()));
        }
        self.chapters.push(chapter);
        Ok(self.touch())
    }

    pub fn remove_chapter(&mut self, id: &ChapterId) -> Result<Chapter, BookError> {
        self.locked_sections.ensure_unlocked(Section::Chapters)?;
        let index = self.chapter_index(id)?;
        let removed = self.chapters.remove(index);
        self.touch();
        Ok(removed)
    }

    /// 将章节移动到新位置（调整阅读顺序）
    pub fn move_chapter(&mut self, id: &ChapterId, to: usize) -> Result<bool, BookError> {
        self.locked_sections.ensure_unlocked(Section::Chapters)?;
        let from = self.chapter_index(id)?;
        let len = self.chapters.len();
        if to >= len {
            return Err(BookError::InvalidChapterIndex { index: to, len });
        }
        if from == to {
            return Ok(false);
        }
        let chapter = self.chapters.remove(from);
        self.chapters.insert(to, chapter);
        Ok(self.touch())
    }

    pub fn set_chapter_title(&mut self, id: &ChapterId, title: impl Into<String>) -> Result<bool, BookError> {
        let title = title.into();
        self.update_chapter(id, |chapter| {
            if chapter.title() == title {
                return false;
            }
            chapter.set_title(title);
            true
        })
    }

    pub fn set_chapter_content(&mut self, id: &ChapterId, content: impl Into<String>) -> Result<bool, BookError> {
        let content = content.into();
        self.update_chapter(id, |chapter| {
            if chapter.content() == content {
                return false;
            }
            chapter.set_content(content);
            true
        })
    }

    pub fn set_chapter_type(&mut self, id: &ChapterId, chapter_type: ChapterType) -> Result<bool, BookError> {
        self.update_chapter(id, |chapter| {
            if chapter.chapter_type() == chapter_type {
                return false;
            }
            chapter.set_chapter_type(chapter_type);
            true
        })
    }

    fn update_chapter<F>(&mut self, id: &ChapterId, apply: F) -> Result<bool, BookError>
    where
        F: FnOnce(&mut Chapter) -> bool,
    {
        self.locked_sections.ensure_unlocked(Section::Chapters)?;
        let index = self.chapter_index(id)?;
        Ok(apply(&mut self.chapters[index]) && self.touch())
    }

    fn chapter_index(&self, id: &ChapterId) -> Result<usize, BookError> {
        self.chapters
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| BookError::ChapterNotFound(id.clone()))
    }

    fn touch(&mut self) -> bool {
        self.updated_at = Utc::now();
        true
    }
}

fn replace_if_changed(slot: &mut String, value: String) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_chapter() -> (Book, ChapterId) {
        let mut book = Book::new();
        let chapter = Chapter::new("One", "<p>first</p>", ChapterType::Content);
        let id = chapter.id().clone();
        book.add_chapter(chapter).unwrap();
        (book, id)
    }

    #[test]
    fn test_new_book_is_empty_and_unlocked() {
        let book = Book::new();
        assert!(book.id().is_none());
        assert_eq!(book.title(), Book::UNTITLED);
        assert!(book.chapters().is_empty());
        assert_eq!(book.locked_sections().locked().count(), 0);
    }

    #[test]
    fn test_locked_chapters_reject_content_edit() {
        let (mut book, id) = book_with_chapter();
        book.toggle_lock(Section::Chapters);

        let result = book.set_chapter_content(&id, "<p>changed</p>");
        assert!(matches!(result, Err(BookError::SectionLocked(Section::Chapters))));
        assert_eq!(book.chapter(&id).unwrap().content(), "<p>first</p>");

        // 其他分区不受影响
        assert!(book.set_title("Still editable").unwrap());
    }

    #[test]
    fn test_each_section_gates_its_fields() {
        let mut book = Book::new();
        book.toggle_lock(Section::BookInfo);
        book.toggle_lock(Section::Publishing);
        book.toggle_lock(Section::Tags);
        book.toggle_lock(Section::Cover);

        assert!(book.set_author("A").is_err());
        assert!(book.set_isbn("978").is_err());
        assert!(book.add_tag("fantasy").is_err());
        assert!(book
            .set_cover(Some(CoverArtifact::from_bytes("image/png", &[0])))
            .is_err());
        assert!(book.author().is_empty());
        assert!(book.tags().is_empty());
        assert!(book.cover().is_none());
    }

    #[test]
    fn test_duplicate_chapter_id_rejected() {
        let (mut book, id) = book_with_chapter();
        let dup = Chapter::with_id(id.clone(), "Again", "", ChapterType::Content);
        assert!(matches!(book.add_chapter(dup), Err(BookError::DuplicateChapter(_))));
        assert_eq!(book.chapters().len(), 1);
    }

    #[test]
    fn test_move_chapter_reorders() {
        let (mut book, first) = book_with_chapter();
        let second = Chapter::new("Two", "", ChapterType::Content);
        let second_id = second.id().clone();
        book.add_chapter(second).unwrap();

        assert!(book.move_chapter(&second_id, 0).unwrap());
        assert_eq!(book.chapters()[0].id(), &second_id);
        assert_eq!(book.chapters()[1].id(), &first);
        assert!(book.move_chapter(&first, 5).is_err());
    }

    #[test]
    fn test_unchanged_value_reports_false() {
        let (mut book, id) = book_with_chapter();
        assert!(!book.set_chapter_content(&id, "<p>first</p>").unwrap());
        assert!(!book.set_title(Book::UNTITLED).unwrap());
        assert!(book.add_tag(" poetry ").unwrap());
        assert!(!book.add_tag("poetry").unwrap());
    }

    #[test]
    fn test_empty_tag_rejected() {
        let mut book = Book::new();
        assert!(matches!(book.add_tag("   "), Err(BookError::InvalidTag(_))));
    }

    #[test]
    fn test_duplicate_book() {
        let (mut book, id) = book_with_chapter();
        book.assign_id(BookId::from_string("remote-1"));
        book.set_title("Dune").unwrap();

        let copy = book.duplicate();
        assert!(copy.id().is_none());
        assert_eq!(copy.title(), "Dune (Copy)");
        assert_eq!(copy.chapters().len(), 1);
        assert_ne!(copy.chapters()[0].id(), &id);
        assert_eq!(copy.chapters()[0].content(), "<p>first</p>");
    }

    #[test]
    fn test_payload_round_trip_ignores_unknown_lock_keys() {
        let json = r#"{
            "id": "b-1",
            "title": "T",
            "chapters": [
                {"id": "c1", "title": "A", "content": "<p>a</p>", "type": "content"}
            ],
            "tags": ["x"],
            "lockedSections": {"cover": true, "sidebar": true}
        }"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.id().map(BookId::as_str), Some("b-1"));
        assert!(book.is_locked(Section::Cover));
        assert!(!book.is_locked(Section::Chapters));
        assert!(book.validate().is_ok());

        let value = serde_json::to_value(&book).unwrap();
        assert_eq!(value["lockedSections"]["cover"], true);
        assert!(value["lockedSections"].get("sidebar").is_none());
        assert!(value["coverArtifact"].is_null());
    }

    #[test]
    fn test_validate_detects_duplicate_ids() {
        let json = r#"{"chapters": [
            {"id": "c1", "title": "A", "content": ""},
            {"id": "c1", "title": "B", "content": ""}
        ]}"#;
        let book: Book = serde_json::from_str(json).unwrap();
        assert!(matches!(book.validate(), Err(BookError::DuplicateChapter(_))));
    }
}
