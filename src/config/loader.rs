//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（folio.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::types::AppConfig;
use crate::infrastructure::worker::{MAX_INTERVAL, MIN_INTERVAL};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["folio", "folio.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `FOLIO_`，层级分隔符 `__`）
/// 2. 配置文件（folio.toml 或 folio.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `FOLIO_AUTOSAVE__INTERVAL_MS=20000`
/// - `FOLIO_GATEWAY__URL=http://books.local/api`
/// - `FOLIO_TYPOGRAPHY__SMART_QUOTES=false`
/// - `FOLIO_PREFERENCES__PATH=/data/prefs.sled`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("autosave.interval_ms", 15_000)?
        .set_default("autosave.saved_display_ms", 2_000)?
        .set_default("autosave.error_display_ms", 3_000)?
        .set_default("autosave.enabled", true)?
        .set_default("cover.max_width", 1200)?
        .set_default("cover.max_height", 1800)?
        .set_default("cover.jpeg_quality", 85)?
        .set_default("gateway.url", "")?
        .set_default("gateway.timeout_secs", 30)?
        .set_default("preferences.path", "data/preferences.sled")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: FOLIO_COVER__JPEG_QUALITY=90
    builder = builder.add_source(
        Environment::with_prefix("FOLIO")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.cover.max_width == 0 || config.cover.max_height == 0 {
        return Err(ConfigError::ValidationError(
            "Cover dimensions must be greater than 0".to_string(),
        ));
    }

    if !(1..=100).contains(&config.cover.jpeg_quality) {
        return Err(ConfigError::ValidationError(format!(
            "JPEG quality must be within 1-100, got {}",
            config.cover.jpeg_quality
        )));
    }

    if config.preferences.path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Preferences path cannot be empty".to_string(),
        ));
    }

    if config.gateway.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Gateway timeout cannot be 0".to_string(),
        ));
    }

    // 超出范围的间隔不是错误，运行时会被限幅
    let interval = Duration::from_millis(config.autosave.interval_ms);
    if interval < MIN_INTERVAL || interval > MAX_INTERVAL {
        tracing::warn!(
            interval_ms = config.autosave.interval_ms,
            "Autosave interval out of range, it will be clamped to 10s-30s"
        );
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    let autosave = config.autosave.to_autosave_config();
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Autosave Enabled: {}", autosave.enabled);
    tracing::info!("Autosave Interval: {}ms", autosave.interval.as_millis());
    tracing::info!(
        "Cover Limits: {}x{} (quality {})",
        config.cover.max_width,
        config.cover.max_height,
        config.cover.jpeg_quality
    );
    if config.gateway.is_offline() {
        tracing::info!("Gateway: in-memory (offline)");
    } else {
        tracing::info!("Gateway: {}", config.gateway.url);
        tracing::info!("Gateway Timeout: {}s", config.gateway.timeout_secs);
    }
    tracing::info!("Preferences: {}", config.preferences.path);
    tracing::info!("Typography: {:?}", config.typography);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
