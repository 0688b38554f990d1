//! In-Memory Document Store
//!
//! 当前打开的 Book 的唯一可写副本。每次真正改变状态的写操作都会递增 revision
//! 并同步通知观察者（自动保存调度器借此标脏）

use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

use crate::domain::book::{
    Book, BookError, BookId, Chapter, ChapterId, ChapterType, CoverArtifact, Section,
};
use crate::domain::typography::{BatchReport, TypographyNormalizer};

/// 文档变更观察者
pub trait DocumentObserver: Send + Sync {
    fn document_changed(&self, revision: u64);
}

/// 某一时刻的文档副本
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub book: Book,
    pub revision: u64,
}

struct StoreState {
    book: Book,
    revision: u64,
}

/// 内存文档存储
pub struct DocumentStore {
    state: RwLock<StoreState>,
    observers: Mutex<Vec<Weak<dyn DocumentObserver>>>,
}

impl DocumentStore {
    pub fn new(book: Book) -> Self {
        Self {
            state: RwLock::new(StoreState { book, revision: 0 }),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 注册观察者（弱引用，观察者释放后自动移除）
    pub fn subscribe(&self, observer: Weak<dyn DocumentObserver>) {
        self.observers.lock().push(observer);
    }

    // ========================================================================
    // 读取
    // ========================================================================

    /// book 与 revision 在同一把锁下读取
    pub fn snapshot(&self) -> DocumentSnapshot {
        let state = self.state.read();
        DocumentSnapshot {
            book: state.book.clone(),
            revision: state.revision,
        }
    }

    pub fn book(&self) -> Book {
        self.state.read().book.clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Book) -> R) -> R {
        f(&self.state.read().book)
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn book_id(&self) -> Option<BookId> {
        self.state.read().book.id().cloned()
    }

    pub fn is_locked(&self, section: Section) -> bool {
        self.state.read().book.is_locked(section)
    }

    // ========================================================================
    // 不标脏的写入
    // ========================================================================

    /// 记录网关分配的 id（id 属于持久化元数据，不算编辑）
    pub fn assign_id(&self, id: BookId) {
        self.state.write().book.assign_id(id);
    }

    /// 整体替换（从网关加载后注入）
    pub fn replace(&self, book: Book) {
        let mut state = self.state.write();
        state.book = book;
        state.revision += 1;
        tracing::debug!(revision = state.revision, "Document replaced");
    }

    // ========================================================================
    // 编辑
    // ========================================================================

    /// 通用编辑入口: `edit` 返回 `Ok(true)` 时递增 revision 并通知观察者
    pub fn edit<F>(&self, edit: F) -> Result<bool, BookError>
    where
        F: FnOnce(&mut Book) -> Result<bool, BookError>,
    {
        let revision = {
            let mut state = self.state.write();
            if !edit(&mut state.book)? {
                return Ok(false);
            }
            Self::bump(&mut state)
        };
        self.notify(revision);
        Ok(true)
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<bool, BookError> {
        self.edit(|book| book.set_title(title))
    }

    pub fn set_author(&self, author: impl Into<String>) -> Result<bool, BookError> {
        self.edit(|book| book.set_author(author))
    }

    pub fn set_publisher(&self, publisher: impl Into<String>) -> Result<bool, BookError> {
        self.edit(|book| book.set_publisher(publisher))
    }

    pub fn set_isbn(&self, isbn: impl Into<String>) -> Result<bool, BookError> {
        self.edit(|book| book.set_isbn(isbn))
    }

    pub fn add_tag(&self, tag: &str) -> Result<bool, BookError> {
        self.edit(|book| book.add_tag(tag))
    }

    pub fn remove_tag(&self, tag: &str) -> Result<bool, BookError> {
        self.edit(|book| book.remove_tag(tag))
    }

    pub fn set_cover(&self, cover: Option<CoverArtifact>) -> Result<bool, BookError> {
        self.edit(|book| book.set_cover(cover))
    }

    /// 追加章节，返回新章节 id
    pub fn add_chapter(&self, chapter: Chapter) -> Result<ChapterId, BookError> {
        let id = chapter.id().clone();
        self.edit(|book| book.add_chapter(chapter))?;
        Ok(id)
    }

    pub fn remove_chapter(&self, id: &ChapterId) -> Result<Chapter, BookError> {
        let mut removed = None;
        self.edit(|book| {
            removed = Some(book.remove_chapter(id)?);
            Ok(true)
        })?;
        removed.ok_or_else(|| BookError::ChapterNotFound(id.clone()))
    }

    pub fn move_chapter(&self, id: &ChapterId, to: usize) -> Result<bool, BookError> {
        self.edit(|book| book.move_chapter(id, to))
    }

    pub fn set_chapter_title(
        &self,
        id: &ChapterId,
        title: impl Into<String>,
    ) -> Result<bool, BookError> {
        self.edit(|book| book.set_chapter_title(id, title))
    }

    pub fn set_chapter_content(
        &self,
        id: &ChapterId,
        content: impl Into<String>,
    ) -> Result<bool, BookError> {
        self.edit(|book| book.set_chapter_content(id, content))
    }

    pub fn set_chapter_type(
        &self,
        id: &ChapterId,
        chapter_type: ChapterType,
    ) -> Result<bool, BookError> {
        self.edit(|book| book.set_chapter_type(id, chapter_type))
    }

    /// 翻转分区锁（锁状态随 Book 一起保存，所以同样标脏）
    pub fn toggle_lock(&self, section: Section) -> bool {
        let (locked, revision) = {
            let mut state = self.state.write();
            let locked = state.book.toggle_lock(section);
            (locked, Self::bump(&mut state))
        };
        self.notify(revision);
        tracing::debug!(section = %section, locked = locked, "Section lock toggled");
        locked
    }

    /// 对所有章节执行排版修复，章节分区锁定时拒绝
    pub fn apply_typography(
        &self,
        normalizer: &TypographyNormalizer,
    ) -> Result<BatchReport, BookError> {
        let mut report = BatchReport::default();
        self.edit(|book| {
            book.locked_sections().ensure_unlocked(Section::Chapters)?;
            report = normalizer.fix_chapters(book.chapters());
            let mut changed = false;
            for fix in report.changed() {
                changed |= book.set_chapter_content(&fix.chapter_id, fix.content.clone())?;
            }
            Ok(changed)
        })?;
        Ok(report)
    }

    fn bump(state: &mut StoreState) -> u64 {
        state.revision += 1;
        state.revision
    }

    fn notify(&self, revision: u64) {
        let observers: Vec<Arc<dyn DocumentObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.document_changed(revision);
        }
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Book::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingObserver {
        calls: AtomicUsize,
        last_revision: AtomicU64,
    }

    impl DocumentObserver for RecordingObserver {
        fn document_changed(&self, revision: u64) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_revision.store(revision, Ordering::SeqCst);
        }
    }

    fn observed_store() -> (DocumentStore, Arc<RecordingObserver>) {
        let store = DocumentStore::default();
        let observer = Arc::new(RecordingObserver::default());
        let dyn_observer: Arc<dyn DocumentObserver> = observer.clone();
        store.subscribe(Arc::downgrade(&dyn_observer));
        (store, observer)
    }

    #[test]
    fn test_changed_edit_bumps_revision_and_notifies() {
        let (store, observer) = observed_store();

        assert!(store.set_title("Moby-Dick").unwrap());
        assert_eq!(store.revision(), 1);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(observer.last_revision.load(Ordering::SeqCst), 1);

        // 相同的值不算变化
        assert!(!store.set_title("Moby-Dick").unwrap());
        assert_eq!(store.revision(), 1);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_locked_edit_is_rejected_without_notify() {
        let (store, observer) = observed_store();
        store.toggle_lock(Section::BookInfo);
        let calls = observer.calls.load(Ordering::SeqCst);

        let err = store.set_author("Melville").unwrap_err();
        assert!(matches!(err, BookError::SectionLocked(Section::BookInfo)));
        assert_eq!(store.book().author(), "");
        assert_eq!(observer.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_assign_id_does_not_count_as_edit() {
        let (store, observer) = observed_store();
        store.assign_id(BookId::from_string("book-1"));

        assert_eq!(store.book_id(), Some(BookId::from_string("book-1")));
        assert_eq!(store.revision(), 0);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_chapter_lifecycle() {
        let store = DocumentStore::default();
        let first = store
            .add_chapter(Chapter::new("One", "<p>a</p>", ChapterType::Content))
            .unwrap();
        let second = store
            .add_chapter(Chapter::new("Two", "<p>b</p>", ChapterType::Content))
            .unwrap();

        assert!(store.move_chapter(&second, 0).unwrap());
        let order: Vec<ChapterId> =
            store.read(|b| b.chapters().iter().map(|c| c.id().clone()).collect());
        assert_eq!(order, vec![second.clone(), first.clone()]);

        let removed = store.remove_chapter(&first).unwrap();
        assert_eq!(removed.title(), "One");
        assert_eq!(store.read(|b| b.chapters().len()), 1);
        assert!(store.remove_chapter(&first).is_err());
    }

    #[test]
    fn test_apply_typography_respects_chapter_lock() {
        let store = DocumentStore::default();
        let id = store
            .add_chapter(Chapter::new("One", "He said \"hi\"...", ChapterType::Content))
            .unwrap();
        let normalizer = TypographyNormalizer::default();

        store.toggle_lock(Section::Chapters);
        assert!(store.apply_typography(&normalizer).is_err());

        store.toggle_lock(Section::Chapters);
        let report = store.apply_typography(&normalizer).unwrap();
        assert!(report.total_changes > 0);
        let content = store.read(|b| b.chapter(&id).map(|c| c.content().to_string()));
        assert_eq!(content.as_deref(), Some("He said \u{201C}hi\u{201D}\u{2026}"));
    }

    #[test]
    fn test_toggle_lock_bumps_revision_and_notifies() {
        let (store, observer) = observed_store();

        assert!(store.toggle_lock(Section::Cover));
        assert_eq!(store.revision(), 1);
        assert_eq!(observer.last_revision.load(Ordering::SeqCst), 1);

        assert!(!store.toggle_lock(Section::Cover));
        assert_eq!(store.revision(), 2);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 2);
        assert!(!store.is_locked(Section::Cover));
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let (store, observer) = observed_store();
        drop(observer);

        assert!(store.set_title("Anything").unwrap());
        assert_eq!(store.observers.lock().len(), 0);
    }
}
