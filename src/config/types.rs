//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::CoverOptions;
use crate::domain::typography::TypographyOptions;
use crate::infrastructure::adapters::HttpBookGatewayConfig;
use crate::infrastructure::persistence::SledPreferenceConfig;
use crate::infrastructure::worker::AutosaveConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 自动保存配置
    #[serde(default)]
    pub autosave: AutosaveSettings,

    /// 封面处理配置
    #[serde(default)]
    pub cover: CoverSettings,

    /// 书籍网关配置
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// 本地偏好设置
    #[serde(default)]
    pub preferences: PreferencesSettings,

    /// 排版规则开关
    #[serde(default)]
    pub typography: TypographyOptions,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 自动保存配置
#[derive(Debug, Clone, Deserialize)]
pub struct AutosaveSettings {
    /// 防抖间隔（毫秒），运行时限制在 10s - 30s
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// `saved` 状态显示时长（毫秒）
    #[serde(default = "default_saved_display_ms")]
    pub saved_display_ms: u64,

    /// `error` 状态显示时长（毫秒）
    #[serde(default = "default_error_display_ms")]
    pub error_display_ms: u64,

    #[serde(default = "default_autosave_enabled")]
    pub enabled: bool,
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_saved_display_ms() -> u64 {
    2_000
}

fn default_error_display_ms() -> u64 {
    3_000
}

fn default_autosave_enabled() -> bool {
    true
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            saved_display_ms: default_saved_display_ms(),
            error_display_ms: default_error_display_ms(),
            enabled: default_autosave_enabled(),
        }
    }
}

impl AutosaveSettings {
    /// 转换为调度器配置（间隔已限幅）
    pub fn to_autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            interval: AutosaveConfig::clamp_interval(Duration::from_millis(self.interval_ms)),
            saved_display: Duration::from_millis(self.saved_display_ms),
            error_display: Duration::from_millis(self.error_display_ms),
            enabled: self.enabled,
        }
    }
}

/// 封面处理配置
#[derive(Debug, Clone, Deserialize)]
pub struct CoverSettings {
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// JPEG 质量 (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_max_width() -> u32 {
    1200
}

fn default_max_height() -> u32 {
    1800
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl CoverSettings {
    pub fn to_options(&self) -> CoverOptions {
        CoverOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// 书籍网关配置
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// 远端 API 基础地址，为空时使用进程内网关（离线模式）
    #[serde(default)]
    pub url: String,

    /// 请求超时（秒）
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_timeout() -> u64 {
    30
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

impl GatewaySettings {
    pub fn is_offline(&self) -> bool {
        self.url.trim().is_empty()
    }

    /// 在线模式下的 HTTP 网关配置
    pub fn to_http_config(&self) -> Option<HttpBookGatewayConfig> {
        if self.is_offline() {
            return None;
        }
        Some(HttpBookGatewayConfig::new(self.url.trim()).with_timeout(self.timeout_secs))
    }
}

/// 本地偏好设置
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesSettings {
    /// Sled 数据库目录
    #[serde(default = "default_preferences_path")]
    pub path: String,
}

fn default_preferences_path() -> String {
    "data/preferences.sled".to_string()
}

impl Default for PreferencesSettings {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
        }
    }
}

impl PreferencesSettings {
    pub fn to_sled_config(&self) -> SledPreferenceConfig {
        SledPreferenceConfig {
            db_path: self.path.clone(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否使用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
