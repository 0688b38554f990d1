//! Book Commands - 书籍生命周期

use crate::domain::book::{Book, BookId};

/// 新建书籍命令（立即在网关建行并拿到 id）
#[derive(Debug, Clone, Default)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// 加载书籍命令
#[derive(Debug, Clone)]
pub struct LoadBook {
    pub book_id: BookId,
}

/// 删除书籍命令
#[derive(Debug, Clone)]
pub struct DeleteBook {
    pub book_id: BookId,
}

/// 复制书籍命令
#[derive(Debug, Clone)]
pub struct DuplicateBook {
    pub book_id: BookId,
}

/// 导出书籍命令（传入当前文档，处理器负责规范化）
#[derive(Debug, Clone)]
pub struct ExportBook {
    pub book: Book,
}
