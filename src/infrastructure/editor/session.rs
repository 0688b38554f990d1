//! Editor Session - 单本书的编辑会话
//!
//! 把文档存储、自动保存调度器、封面处理、偏好设置和快捷键组装在一起。
//! 所有编辑都经过文档存储，成功的编辑由调度器自动标脏

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::application::commands::{handlers::LoadBookHandler, LoadBook};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    preference_keys, BookGatewayPort, CoverFile, CoverProcessorPort, PreferenceStorePort,
    PreferenceValue, ProcessedCover,
};
use crate::application::shortcuts::{EditorAction, KeyEvent, ShortcutDispatcher};
use crate::domain::book::{
    Book, BookError, BookId, Chapter, ChapterId, ChapterType, Section,
};
use crate::domain::typography::{BatchReport, TypographyIssue, TypographyNormalizer};
use crate::infrastructure::events::{EditorEvent, EventPublisher};
use crate::infrastructure::memory::DocumentStore;
use crate::infrastructure::worker::{AutosaveConfig, AutosaveScheduler, SaveOutcome, SaveState};

/// 有未保存修改时离开页面的提示
pub const UNLOAD_WARNING: &str = "You have unsaved changes. Are you sure you want to leave?";

/// 会话依赖的外部端口
#[derive(Clone)]
pub struct EditorDeps {
    pub gateway: Arc<dyn BookGatewayPort>,
    pub cover: Arc<dyn CoverProcessorPort>,
    pub preferences: Arc<dyn PreferenceStorePort>,
    pub events: Arc<EventPublisher>,
}

/// 编辑会话
pub struct EditorSession {
    store: Arc<DocumentStore>,
    autosave: Arc<AutosaveScheduler>,
    cover: Arc<dyn CoverProcessorPort>,
    preferences: Arc<dyn PreferenceStorePort>,
    events: Arc<EventPublisher>,
    shortcuts: ShortcutDispatcher,
    normalizer: TypographyNormalizer,
}

impl EditorSession {
    /// 打开一本已在内存中的书
    ///
    /// 必须在 tokio 运行时中调用。上次使用的防抖间隔优先于 `config.interval`
    pub fn open(
        book: Book,
        deps: EditorDeps,
        mut config: AutosaveConfig,
        normalizer: TypographyNormalizer,
    ) -> Self {
        if let Some(interval) = remembered_interval(deps.preferences.as_ref()) {
            config.interval = interval;
        }

        let book_id = book.id().cloned();
        let store = DocumentStore::new(book).arc();
        let autosave = AutosaveScheduler::new(
            config,
            store.clone(),
            deps.gateway,
            deps.events.clone(),
            normalizer.clone(),
        );

        tracing::info!(
            book_id = ?book_id.as_ref().map(|id| id.as_str()),
            interval_ms = autosave.interval().as_millis() as u64,
            "Editor session opened"
        );

        Self {
            store,
            autosave,
            cover: deps.cover,
            preferences: deps.preferences,
            events: deps.events,
            shortcuts: ShortcutDispatcher::with_defaults(),
            normalizer,
        }
    }

    /// 新建空白书（第一次保存时才向网关申请 id）
    pub fn new_book(
        deps: EditorDeps,
        config: AutosaveConfig,
        normalizer: TypographyNormalizer,
    ) -> Self {
        Self::open(Book::new(), deps, config, normalizer)
    }

    /// 从网关加载已有的书
    pub async fn hydrate(
        book_id: BookId,
        deps: EditorDeps,
        config: AutosaveConfig,
        normalizer: TypographyNormalizer,
    ) -> Result<Self, ApplicationError> {
        let book = LoadBookHandler::new(deps.gateway.clone())
            .handle(LoadBook { book_id })
            .await?;
        Ok(Self::open(book, deps, config, normalizer))
    }

    /// 替换快捷键表
    pub fn with_shortcuts(mut self, shortcuts: ShortcutDispatcher) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    // ========================================================================
    // 读取
    // ========================================================================

    pub fn book(&self) -> Book {
        self.store.book()
    }

    pub fn book_id(&self) -> Option<BookId> {
        self.store.book_id()
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn autosave(&self) -> &Arc<AutosaveScheduler> {
        &self.autosave
    }

    pub fn save_state(&self) -> SaveState {
        self.autosave.state()
    }

    pub fn is_locked(&self, section: Section) -> bool {
        self.store.is_locked(section)
    }

    /// 订阅编辑器事件
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // 编辑（每个入口都受对应分区锁约束）
    // ========================================================================

    pub fn set_title(&self, title: impl Into<String>) -> Result<bool, ApplicationError> {
        Ok(self.store.set_title(title)?)
    }

    pub fn set_author(&self, author: impl Into<String>) -> Result<bool, ApplicationError> {
        Ok(self.store.set_author(author)?)
    }

    pub fn set_publisher(&self, publisher: impl Into<String>) -> Result<bool, ApplicationError> {
        Ok(self.store.set_publisher(publisher)?)
    }

    pub fn set_isbn(&self, isbn: impl Into<String>) -> Result<bool, ApplicationError> {
        Ok(self.store.set_isbn(isbn)?)
    }

    pub fn add_tag(&self, tag: &str) -> Result<bool, ApplicationError> {
        Ok(self.store.add_tag(tag)?)
    }

    pub fn remove_tag(&self, tag: &str) -> Result<bool, ApplicationError> {
        Ok(self.store.remove_tag(tag)?)
    }

    pub fn add_chapter(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        chapter_type: ChapterType,
    ) -> Result<ChapterId, ApplicationError> {
        Ok(self
            .store
            .add_chapter(Chapter::new(title, content, chapter_type))?)
    }

    pub fn remove_chapter(&self, id: &ChapterId) -> Result<Chapter, ApplicationError> {
        Ok(self.store.remove_chapter(id)?)
    }

    pub fn move_chapter(&self, id: &ChapterId, to: usize) -> Result<bool, ApplicationError> {
        Ok(self.store.move_chapter(id, to)?)
    }

    pub fn set_chapter_title(
        &self,
        id: &ChapterId,
        title: impl Into<String>,
    ) -> Result<bool, ApplicationError> {
        Ok(self.store.set_chapter_title(id, title)?)
    }

    pub fn set_chapter_content(
        &self,
        id: &ChapterId,
        content: impl Into<String>,
    ) -> Result<bool, ApplicationError> {
        Ok(self.store.set_chapter_content(id, content)?)
    }

    pub fn set_chapter_type(
        &self,
        id: &ChapterId,
        chapter_type: ChapterType,
    ) -> Result<bool, ApplicationError> {
        Ok(self.store.set_chapter_type(id, chapter_type)?)
    }

    /// 翻转分区锁，返回新的锁定状态
    pub fn toggle_lock(&self, section: Section) -> bool {
        self.store.toggle_lock(section)
    }

    // ========================================================================
    // 封面
    // ========================================================================

    /// 处理图片并设为封面
    ///
    /// 封面锁定时不调用处理器。处理本身不会失败，解码失败时原始字节成为封面
    pub async fn set_cover_from_file(
        &self,
        file: CoverFile,
    ) -> Result<ProcessedCover, ApplicationError> {
        if self.store.is_locked(Section::Cover) {
            return Err(BookError::SectionLocked(Section::Cover).into());
        }

        let processed = self.cover.process(file).await;
        // 处理期间可能被锁上，set_cover 会再检查一次
        self.store.set_cover(Some(processed.artifact.clone()))?;

        tracing::info!(
            encoding = ?processed.encoding,
            original_size = processed.original_size,
            encoded_size = processed.encoded_size,
            "Cover updated"
        );
        Ok(processed)
    }

    pub fn remove_cover(&self) -> Result<bool, ApplicationError> {
        Ok(self.store.set_cover(None)?)
    }

    // ========================================================================
    // 排版
    // ========================================================================

    /// 修复全部章节。章节分区锁定时拒绝，不做任何修改
    pub fn apply_typography(&self) -> Result<BatchReport, ApplicationError> {
        let report = self.store.apply_typography(&self.normalizer)?;
        tracing::info!(
            changed_chapters = report.changed().count(),
            total_changes = report.total_changes,
            "Typography applied"
        );
        Ok(report)
    }

    /// 列出每个章节会被修复的问题（不修改文档），没有问题的章节不出现
    pub fn check_typography(&self) -> Vec<(ChapterId, Vec<TypographyIssue>)> {
        self.store.read(|book| {
            book.chapters()
                .iter()
                .map(|chapter| (chapter.id().clone(), self.normalizer.check(chapter.content())))
                .filter(|(_, issues)| !issues.is_empty())
                .collect()
        })
    }

    // ========================================================================
    // 快捷键
    // ========================================================================

    /// 处理一次按键
    ///
    /// `Save` 在后台立即保存，`FixTypography` 直接修复；其余动作返回给调用方处理
    pub fn handle_key_down(&self, event: &mut KeyEvent) -> Option<EditorAction> {
        self.shortcuts.dispatch(event, |action| match action {
            EditorAction::Save => self.autosave.trigger_save(),
            EditorAction::FixTypography => {
                if let Err(e) = self.apply_typography() {
                    tracing::warn!(error = %e, "Typography shortcut rejected");
                }
            }
            _ => {}
        })
    }

    // ========================================================================
    // 保存
    // ========================================================================

    /// 有未保存修改时返回离开前的确认提示
    pub fn unload_warning(&self) -> Option<&'static str> {
        self.autosave.is_dirty().then_some(UNLOAD_WARNING)
    }

    /// 立即保存（不等待防抖）
    pub async fn save_now(&self) -> SaveOutcome {
        self.autosave.save().await
    }

    /// 修改防抖间隔并记住它，返回限幅后的实际值
    pub fn set_autosave_interval(&self, interval: Duration) -> Result<Duration, ApplicationError> {
        let applied = self.autosave.set_interval(interval);
        self.preferences.set(
            preference_keys::AUTOSAVE_INTERVAL_MS,
            PreferenceValue::Int(applied.as_millis() as i64),
        )?;
        Ok(applied)
    }

    pub fn set_autosave_enabled(&self, enabled: bool) {
        self.autosave.set_enabled(enabled);
    }

    /// 侧边栏宽度
    pub fn panel_width(&self) -> Option<u32> {
        match self.preferences.get(preference_keys::PANEL_WIDTH) {
            Ok(value) => value
                .and_then(|v| v.as_i64())
                .and_then(|w| u32::try_from(w).ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read panel width");
                None
            }
        }
    }

    pub fn set_panel_width(&self, width: u32) -> Result<(), ApplicationError> {
        self.preferences
            .set(preference_keys::PANEL_WIDTH, PreferenceValue::Int(width as i64))?;
        Ok(())
    }

    /// 关闭会话: 取消待触发的保存，进行中的保存会跑完
    pub fn teardown(&self) {
        self.autosave.teardown();
        tracing::info!(
            book_id = ?self.store.book_id().map(|id| id.as_str().to_string()),
            dirty = self.autosave.is_dirty(),
            "Editor session closed"
        );
    }
}

/// 读取上次使用的防抖间隔，读取失败按未设置处理
fn remembered_interval(preferences: &dyn PreferenceStorePort) -> Option<Duration> {
    match preferences.get(preference_keys::AUTOSAVE_INTERVAL_MS) {
        Ok(value) => value
            .and_then(|v| v.as_i64())
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read autosave interval preference");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CoverEncoding, CoverOptions};
    use crate::infrastructure::adapters::{ImageCoverProcessor, InMemoryBookGateway};
    use crate::infrastructure::memory::InMemoryPreferenceStore;
    use crate::infrastructure::worker::SaveStatus;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct Fixture {
        gateway: Arc<InMemoryBookGateway>,
        preferences: Arc<InMemoryPreferenceStore>,
        deps: EditorDeps,
    }

    fn fixture() -> Fixture {
        let gateway = InMemoryBookGateway::new().arc();
        let preferences = InMemoryPreferenceStore::new().arc();
        let deps = EditorDeps {
            gateway: gateway.clone(),
            cover: ImageCoverProcessor::new(CoverOptions::default()).arc(),
            preferences: preferences.clone(),
            events: EventPublisher::new().arc(),
        };
        Fixture {
            gateway,
            preferences,
            deps,
        }
    }

    fn new_session(f: &Fixture) -> EditorSession {
        EditorSession::new_book(
            f.deps.clone(),
            AutosaveConfig::default(),
            TypographyNormalizer::default(),
        )
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_are_autosaved_after_quiet_period() {
        let f = fixture();
        let session = new_session(&f);

        session.set_title("Draft").unwrap();
        session
            .add_chapter("One", "<p>Hello</p>", ChapterType::Content)
            .unwrap();
        assert!(session.save_state().is_dirty);

        advance(16).await;

        assert_eq!(f.gateway.save_calls(), 1);
        assert!(!session.save_state().is_dirty);
        assert!(session.save_state().last_saved.is_some());
        let id = session.book_id().unwrap();
        assert_eq!(f.gateway.stored(&id).unwrap().title(), "Draft");
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_chapters_reject_edits_without_marking_dirty() {
        let f = fixture();
        let session = new_session(&f);
        let chapter = session
            .add_chapter("One", "original", ChapterType::Content)
            .unwrap();
        session.save_now().await;
        assert!(!session.save_state().is_dirty);

        assert!(session.toggle_lock(Section::Chapters));
        session.save_now().await;

        let err = session.set_chapter_content(&chapter, "changed").unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Book(BookError::SectionLocked(Section::Chapters))
        ));
        assert_eq!(session.book().chapters()[0].content(), "original");
        assert!(!session.save_state().is_dirty);

        assert!(session.apply_typography().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_warning_follows_dirty_state() {
        let f = fixture();
        let session = new_session(&f);
        assert_eq!(session.unload_warning(), None);

        session.set_author("Someone").unwrap();
        assert_eq!(session.unload_warning(), Some(UNLOAD_WARNING));

        assert!(session.save_now().await.is_saved());
        assert_eq!(session.unload_warning(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ctrl_s_saves_immediately() {
        let f = fixture();
        let session = new_session(&f);
        session.set_title("Shortcut").unwrap();

        let mut event = KeyEvent::new("s").ctrl().in_editable();
        assert_eq!(session.handle_key_down(&mut event), Some(EditorAction::Save));
        assert!(event.is_default_prevented());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.gateway.save_calls(), 1);
        assert_eq!(session.save_state().status, SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_typography_shortcut() {
        let f = fixture();
        let session = new_session(&f);
        session
            .add_chapter("One", "wait...", ChapterType::Content)
            .unwrap();

        let mut event = KeyEvent::new("f").ctrl().shift();
        assert_eq!(
            session.handle_key_down(&mut event),
            Some(EditorAction::FixTypography)
        );
        assert_eq!(session.book().chapters()[0].content(), "wait\u{2026}");
        assert!(session.check_typography().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_typography_lists_only_affected_chapters() {
        let f = fixture();
        let session = new_session(&f);
        session
            .add_chapter("Clean", "Nothing to do.", ChapterType::Content)
            .unwrap();
        let messy = session
            .add_chapter("Messy", "well--actually", ChapterType::Content)
            .unwrap();

        let issues = session.check_typography();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].0, messy);
        assert!(issues[0].1.contains(&TypographyIssue::Dashes));
        // 只检查，不修改
        assert_eq!(session.book().chapter(&messy).unwrap().content(), "well--actually");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_clamped_and_remembered() {
        let f = fixture();
        let session = new_session(&f);

        let applied = session.set_autosave_interval(Duration::from_secs(5)).unwrap();
        assert_eq!(applied, Duration::from_secs(10));
        assert_eq!(
            f.preferences
                .get(preference_keys::AUTOSAVE_INTERVAL_MS)
                .unwrap(),
            Some(PreferenceValue::Int(10_000))
        );

        let reopened = new_session(&f);
        assert_eq!(reopened.autosave().interval(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panel_width_preference() {
        let f = fixture();
        let session = new_session(&f);
        assert_eq!(session.panel_width(), None);

        session.set_panel_width(320).unwrap();
        assert_eq!(session.panel_width(), Some(320));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydrate_loads_saved_book() {
        let f = fixture();
        let first = new_session(&f);
        first.set_title("Persisted").unwrap();
        first.save_now().await;
        let id = first.book_id().unwrap();
        first.teardown();

        let second = EditorSession::hydrate(
            id.clone(),
            f.deps.clone(),
            AutosaveConfig::default(),
            TypographyNormalizer::default(),
        )
        .await
        .unwrap();

        assert_eq!(second.book_id(), Some(id));
        assert_eq!(second.book().title(), "Persisted");
        assert!(!second.save_state().is_dirty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_autosave() {
        let f = fixture();
        let session = new_session(&f);
        session.set_title("Abandoned").unwrap();

        session.teardown();
        advance(60).await;

        assert_eq!(f.gateway.save_calls(), 0);
        assert!(session.unload_warning().is_some());
    }

    #[tokio::test]
    async fn test_cover_from_file_is_processed_and_marks_dirty() {
        let f = fixture();
        let session = new_session(&f);

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 60, Rgb([10, 20, 30])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let processed = session
            .set_cover_from_file(CoverFile::new("cover.png", bytes))
            .await
            .unwrap();

        assert_eq!(processed.encoding, CoverEncoding::Jpeg);
        assert_eq!(processed.dimensions, Some((40, 60)));
        let book = session.book();
        assert_eq!(book.cover().unwrap().mime_type(), Some("image/jpeg"));
        assert!(session.save_state().is_dirty);
        session.teardown();
    }

    #[tokio::test]
    async fn test_cover_lock_blocks_processing() {
        let f = fixture();
        let session = new_session(&f);
        session.toggle_lock(Section::Cover);

        let err = session
            .set_cover_from_file(CoverFile::new("cover.png", vec![1, 2, 3]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Book(BookError::SectionLocked(Section::Cover))
        ));
        assert!(session.book().cover().is_none());
        session.teardown();
    }
}
