//! Book Context - 分区锁
//!
//! 每个逻辑分区一个布尔开关。锁定期间该分区的所有写入口被拒绝，读取不受影响，
//! 也不影响自动保存。

use serde::{Deserialize, Serialize};

use super::BookError;

/// 可锁定的分区（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    /// 标题、作者
    BookInfo,
    /// 出版社、ISBN
    Publishing,
    /// 标签
    Tags,
    /// 封面
    Cover,
    /// 章节（增删、排序、标题、正文、类型）
    Chapters,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::BookInfo,
        Section::Publishing,
        Section::Tags,
        Section::Cover,
        Section::Chapters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::BookInfo => "bookInfo",
            Section::Publishing => "publishing",
            Section::Tags => "tags",
            Section::Cover => "cover",
            Section::Chapters => "chapters",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == s)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 分区锁状态
///
/// 反序列化时未知键被忽略，缺失键默认为未锁定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LockedSections {
    book_info: bool,
    publishing: bool,
    tags: bool,
    cover: bool,
    chapters: bool,
}

impl LockedSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, section: Section) -> bool {
        match section {
            Section::BookInfo => self.book_info,
            Section::Publishing => self.publishing,
            Section::Tags => self.tags,
            Section::Cover => self.cover,
            Section::Chapters => self.chapters,
        }
    }

    pub fn set(&mut self, section: Section, locked: bool) {
        *self.slot_mut(section) = locked;
    }

    /// 翻转开关，返回新状态
    pub fn toggle(&mut self, section: Section) -> bool {
        let slot = self.slot_mut(section);
        *slot = !*slot;
        *slot
    }

    /// 写入前的检查
    pub fn ensure_unlocked(&self, section: Section) -> Result<(), BookError> {
        if self.is_locked(section) {
            return Err(BookError::SectionLocked(section));
        }
        Ok(())
    }

    pub fn locked(&self) -> impl Iterator<Item = Section> + '_ {
        Section::ALL
            .into_iter()
            .filter(|section| self.is_locked(*section))
    }

    fn slot_mut(&mut self, section: Section) -> &mut bool {
        match section {
            Section::BookInfo => &mut self.book_info,
            Section::Publishing => &mut self.publishing,
            Section::Tags => &mut self.tags,
            Section::Cover => &mut self.cover,
            Section::Chapters => &mut self.chapters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_flag() {
        let mut locks = LockedSections::new();
        assert!(!locks.is_locked(Section::Cover));
        assert!(locks.toggle(Section::Cover));
        assert!(locks.is_locked(Section::Cover));
        assert!(!locks.toggle(Section::Cover));
        assert!(!locks.is_locked(Section::Cover));
    }

    #[test]
    fn test_ensure_unlocked() {
        let mut locks = LockedSections::new();
        assert!(locks.ensure_unlocked(Section::Tags).is_ok());
        locks.set(Section::Tags, true);
        assert!(matches!(
            locks.ensure_unlocked(Section::Tags),
            Err(BookError::SectionLocked(Section::Tags))
        ));
        assert!(locks.ensure_unlocked(Section::Chapters).is_ok());
    }

    #[test]
    fn test_unknown_keys_ignored_and_missing_default_unlocked() {
        let json = r#"{"chapters": true, "layout": true}"#;
        let locks: LockedSections = serde_json::from_str(json).unwrap();
        assert!(locks.is_locked(Section::Chapters));
        assert!(!locks.is_locked(Section::BookInfo));
        assert_eq!(locks.locked().collect::<Vec<_>>(), vec![Section::Chapters]);
    }

    #[test]
    fn test_serializes_camel_case_keys() {
        let mut locks = LockedSections::new();
        locks.set(Section::BookInfo, true);
        let value = serde_json::to_value(locks).unwrap();
        assert_eq!(value["bookInfo"], true);
        assert_eq!(value["publishing"], false);
    }

    #[test]
    fn test_section_from_str() {
        assert_eq!(Section::from_str("publishing"), Some(Section::Publishing));
        assert_eq!(Section::from_str("layout"), None);
    }
}
