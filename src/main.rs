//! Folio - 无界面运行器
//!
//! 用法: `folio <book.json> [cover-image]`
//!
//! 读取书籍 JSON，检查并修复排版，可选设置封面，经配置的网关保存后输出摘要

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use folio::application::ports::{BookGatewayPort, CoverFile};
use folio::config::{load_config, print_config, AppConfig};
use folio::domain::book::Book;
use folio::domain::typography::TypographyNormalizer;
use folio::infrastructure::adapters::{HttpBookGateway, ImageCoverProcessor, InMemoryBookGateway};
use folio::infrastructure::editor::{EditorDeps, EditorSession};
use folio::infrastructure::events::EventPublisher;
use folio::infrastructure::persistence::SledPreferenceStore;
use folio::infrastructure::worker::SaveOutcome;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    tracing::info!("Folio - 电子书编辑核心");
    print_config(&config);

    let mut args = std::env::args().skip(1);
    let book_path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .context("Usage: folio <book.json> [cover-image]")?;
    let cover_path = args.next().map(PathBuf::from);

    // 确保偏好设置目录存在
    if let Some(parent) = Path::new(&config.preferences.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let preferences = SledPreferenceStore::new(&config.preferences.to_sled_config())?.arc();

    let gateway: Arc<dyn BookGatewayPort> = match config.gateway.to_http_config() {
        Some(http_config) => Arc::new(HttpBookGateway::new(http_config)?),
        None => InMemoryBookGateway::new().arc(),
    };

    let raw = tokio::fs::read_to_string(&book_path)
        .await
        .with_context(|| format!("Failed to read {}", book_path.display()))?;
    let book: Book = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", book_path.display()))?;
    book.validate()?;

    let deps = EditorDeps {
        gateway,
        cover: ImageCoverProcessor::new(config.cover.to_options()).arc(),
        preferences: preferences.clone(),
        events: EventPublisher::new().arc(),
    };
    let session = EditorSession::open(
        book,
        deps,
        config.autosave.to_autosave_config(),
        TypographyNormalizer::new(config.typography),
    );

    // 排版检查与修复
    for (chapter_id, issues) in session.check_typography() {
        let issues: Vec<&str> = issues.iter().map(|issue| issue.description()).collect();
        tracing::info!(chapter_id = %chapter_id, issues = ?issues, "Typography issues found");
    }
    let typography_changes = match session.apply_typography() {
        Ok(report) => report.total_changes,
        Err(e) => {
            tracing::warn!(error = %e, "Typography fix skipped");
            0
        }
    };

    // 封面
    if let Some(path) = cover_path {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        match session.set_cover_from_file(CoverFile::new(file_name, bytes)).await {
            Ok(cover) => tracing::info!(encoding = ?cover.encoding, "Cover set"),
            Err(e) => tracing::warn!(error = %e, "Cover skipped"),
        }
    }

    // 未修改的书也要写一次
    session.autosave().mark_dirty();
    let outcome = session.save_now().await;
    session.teardown();
    preferences.flush()?;

    let book = session.book();
    println!("Title:              {}", book.title());
    println!("Chapters:           {}", book.chapters().len());
    println!("Typography changes: {}", typography_changes);
    println!(
        "Cover:              {}",
        book.cover()
            .and_then(|cover| cover.mime_type())
            .unwrap_or("none")
    );

    match outcome {
        SaveOutcome::Saved { book_id, revision, .. } => {
            println!("Saved:              {} (revision {})", book_id, revision);
            Ok(())
        }
        SaveOutcome::Failed { error } => Err(anyhow::anyhow!("Save failed: {}", error)),
        SaveOutcome::Skipped(reason) => Err(anyhow::anyhow!("Save skipped: {:?}", reason)),
    }
}

/// 初始化日志（`RUST_LOG` 优先于配置）
fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},folio={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
