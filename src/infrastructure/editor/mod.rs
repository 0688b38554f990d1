//! Editor - 编辑会话装配

mod session;

pub use session::{EditorDeps, EditorSession, UNLOAD_WARNING};
