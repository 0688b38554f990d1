//! 键盘快捷键分发
//!
//! 有序绑定表，第一条匹配的绑定生效。焦点在可编辑区域时，
//! 只有标记了 `allow_in_editable` 的绑定参与匹配

use serde::{Deserialize, Serialize};

/// 编辑器动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorAction {
    Save,
    Export,
    FindReplace,
    FixTypography,
    NewChapter,
    NextChapter,
    PreviousChapter,
    TogglePreview,
    ToggleSidebar,
}

/// 按键发生时的焦点位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusContext {
    #[default]
    Document,
    /// 输入框、文本域或 contenteditable
    Editable,
}

/// 按键事件
#[derive(Debug, Clone, Default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    pub focus: FocusContext,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn in_editable(mut self) -> Self {
        self.focus = FocusContext::Editable;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// 快捷键绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutBinding {
    /// 小写键名
    pub key: String,
    pub require_ctrl_or_meta: bool,
    pub require_shift: bool,
    pub require_alt: bool,
    pub allow_in_editable: bool,
    pub action: EditorAction,
}

impl ShortcutBinding {
    /// 解析 `"ctrl+shift+f"` 形式的组合键
    ///
    /// `ctrl` / `cmd` / `meta` / `mod` 都表示 Ctrl 或 Meta。缺少主键时返回 `None`
    pub fn parse(combo: &str, action: EditorAction) -> Option<Self> {
        let normalized = combo.trim().to_ascii_lowercase();
        let mut binding = Self {
            key: String::new(),
            require_ctrl_or_meta: false,
            require_shift: false,
            require_alt: false,
            allow_in_editable: false,
            action,
        };

        for token in normalized.split('+').map(str::trim).filter(|s| !s.is_empty()) {
            match token {
                "ctrl" | "control" | "meta" | "cmd" | "command" | "mod" => {
                    binding.require_ctrl_or_meta = true
                }
                "shift" => binding.require_shift = true,
                "alt" | "option" => binding.require_alt = true,
                key => binding.key = normalize_key(key),
            }
        }

        if binding.key.is_empty() {
            None
        } else {
            Some(binding)
        }
    }

    pub fn editable(mut self) -> Self {
        self.allow_in_editable = true;
        self
    }

    /// 键名与全部修饰键都要严格一致
    pub fn matches(&self, event: &KeyEvent) -> bool {
        normalize_key(&event.key) == self.key
            && (event.ctrl || event.meta) == self.require_ctrl_or_meta
            && event.shift == self.require_shift
            && event.alt == self.require_alt
    }
}

fn normalize_key(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "spacebar" | " " => "space".to_string(),
        "esc" => "escape".to_string(),
        other => other.to_string(),
    }
}

/// 默认绑定表（顺序即优先级）
const DEFAULT_BINDINGS: &[(&str, EditorAction, bool)] = &[
    ("ctrl+s", EditorAction::Save, true),
    ("ctrl+e", EditorAction::Export, true),
    ("ctrl+f", EditorAction::FindReplace, true),
    ("ctrl+shift+f", EditorAction::FixTypography, false),
    ("alt+n", EditorAction::NewChapter, false),
    ("alt+arrowdown", EditorAction::NextChapter, false),
    ("alt+arrowup", EditorAction::PreviousChapter, false),
    ("ctrl+p", EditorAction::TogglePreview, false),
    ("ctrl+\\", EditorAction::ToggleSidebar, false),
];

/// 快捷键分发器
#[derive(Debug, Clone)]
pub struct ShortcutDispatcher {
    bindings: Vec<ShortcutBinding>,
}

impl ShortcutDispatcher {
    pub fn new(bindings: Vec<ShortcutBinding>) -> Self {
        Self { bindings }
    }

    pub fn with_defaults() -> Self {
        let bindings = DEFAULT_BINDINGS
            .iter()
            .filter_map(|(combo, action, editable)| {
                let binding = ShortcutBinding::parse(combo, *action)?;
                Some(if *editable { binding.editable() } else { binding })
            })
            .collect();
        Self::new(bindings)
    }

    pub fn bindings(&self) -> &[ShortcutBinding] {
        &self.bindings
    }

    /// 追加到表尾（优先级最低）
    pub fn bind(&mut self, binding: ShortcutBinding) {
        self.bindings.push(binding);
    }

    /// 分发一次按键
    ///
    /// 命中时标记事件并调用一次 `on_action`，返回命中的动作
    pub fn dispatch<F>(&self, event: &mut KeyEvent, on_action: F) -> Option<EditorAction>
    where
        F: FnOnce(EditorAction),
    {
        let editable = event.focus == FocusContext::Editable;
        let binding = self
            .bindings
            .iter()
            .filter(|b| !editable || b.allow_in_editable)
            .find(|b| b.matches(event))?;

        event.prevent_default();
        event.stop_propagation();
        tracing::debug!(key = %event.key, action = ?binding.action, "Shortcut dispatched");
        on_action(binding.action);
        Some(binding.action)
    }
}

impl Default for ShortcutDispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(dispatcher: &ShortcutDispatcher, mut event: KeyEvent) -> (Vec<EditorAction>, KeyEvent) {
        let mut invoked = Vec::new();
        dispatcher.dispatch(&mut event, |action| invoked.push(action));
        (invoked, event)
    }

    #[test]
    fn test_parse_binding() {
        let binding = ShortcutBinding::parse(" Ctrl + Shift + F ", EditorAction::FixTypography).unwrap();
        assert_eq!(binding.key, "f");
        assert!(binding.require_ctrl_or_meta);
        assert!(binding.require_shift);
        assert!(!binding.require_alt);
        assert!(!binding.allow_in_editable);

        assert!(ShortcutBinding::parse("ctrl+shift", EditorAction::Save).is_none());
    }

    #[test]
    fn test_save_fires_once_and_marks_event() {
        let dispatcher = ShortcutDispatcher::with_defaults();

        let (invoked, event) = dispatch(&dispatcher, KeyEvent::new("s").ctrl());

        assert_eq!(invoked, vec![EditorAction::Save]);
        assert!(event.is_default_prevented());
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn test_meta_counts_as_ctrl() {
        let dispatcher = ShortcutDispatcher::with_defaults();
        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("S").meta());
        assert_eq!(invoked, vec![EditorAction::Save]);
    }

    #[test]
    fn test_modifiers_must_match_exactly() {
        let dispatcher = ShortcutDispatcher::with_defaults();

        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("f").ctrl());
        assert_eq!(invoked, vec![EditorAction::FindReplace]);

        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("f").ctrl().shift());
        assert_eq!(invoked, vec![EditorAction::FixTypography]);

        let (invoked, event) = dispatch(&dispatcher, KeyEvent::new("s").ctrl().alt());
        assert!(invoked.is_empty());
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn test_editable_focus_only_allows_whitelisted() {
        let dispatcher = ShortcutDispatcher::with_defaults();

        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("s").ctrl().in_editable());
        assert_eq!(invoked, vec![EditorAction::Save]);

        let (invoked, event) = dispatch(&dispatcher, KeyEvent::new("p").ctrl().in_editable());
        assert!(invoked.is_empty());
        assert!(!event.is_propagation_stopped());

        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("p").ctrl());
        assert_eq!(invoked, vec![EditorAction::TogglePreview]);
    }

    #[test]
    fn test_first_binding_wins() {
        let mut dispatcher = ShortcutDispatcher::with_defaults();
        dispatcher.bind(ShortcutBinding::parse("ctrl+s", EditorAction::Export).unwrap());

        let (invoked, _) = dispatch(&dispatcher, KeyEvent::new("s").ctrl());
        assert_eq!(invoked, vec![EditorAction::Save]);
    }

    #[test]
    fn test_unbound_key_is_untouched() {
        let dispatcher = ShortcutDispatcher::with_defaults();
        let (invoked, event) = dispatch(&dispatcher, KeyEvent::new("q"));
        assert!(invoked.is_empty());
        assert!(!event.is_default_prevented());
        assert!(!event.is_propagation_stopped());
    }
}
