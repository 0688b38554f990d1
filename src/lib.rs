//! Folio - 电子书文档编辑与持久化核心
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 书籍聚合、章节、分区锁
//! - Typography: 排版规范化
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BookGateway, CoverProcessor, EpubBuilder, PreferenceStore）
//! - Commands: CQRS 命令处理器
//! - Shortcuts: 快捷键分发
//!
//! 基础设施层 (infrastructure/):
//! - Memory: 文档存储、内存偏好设置
//! - Worker: 防抖自动保存
//! - Persistence: Sled 偏好设置
//! - Adapters: 书籍网关、封面处理
//! - Events: 保存状态事件发布
//! - Editor: 编辑会话

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
