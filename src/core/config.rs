//! 配置管理系统 (Configuration Management)
//!
//! 负责 `webguard.toml` 的反序列化及其层级结构映射，支持环境变量覆盖与默认值回退机制。
//!
//! 拦截策略本身的常量（扩展协议、回环地址、bundle 文件名）是编译期固定的，不在此处配置。

use std::path::Path;
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::core::error::{GuardError, Result};

/// 默认配置文件名
pub const CONFIG_FILE: &str = "webguard.toml";

/// 环境变量前缀，例如 `WEBGUARD__PIPELINE__LOG_REQUESTS=true`
const ENV_PREFIX: &str = "WEBGUARD";

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 日志输出配置
    #[builder(default)]
    pub log: LogConfig,

    /// 拦截管线配置
    #[builder(default)]
    pub pipeline: PipelineConfig,

    /// 批量派发参数
    #[builder(default)]
    pub dispatch: DispatchConfig,
}

/// 日志配置
#[derive(Debug, Deserialize, Builder, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// 未设置 `RUST_LOG` 时使用的过滤级别
    #[builder(default = default_log_level())]
    pub level: String,
}

/// 拦截管线配置
#[derive(Debug, Deserialize, Builder, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// 单个拦截器的判定超时（毫秒）。未设置时不限时。
    pub handler_timeout_ms: Option<u64>,
    /// 是否注册请求日志拦截器
    #[builder(default)]
    pub log_requests: bool,
    /// 是否安装扩展拦截过滤器
    #[builder(default = true)]
    pub extension_filter: bool,
}

/// 批量派发参数
#[derive(Debug, Deserialize, Builder, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    /// 并发派发的请求数上限
    #[builder(default = default_concurrency())]
    pub concurrency: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: None,
            log_requests: false,
            extension_filter: true,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_concurrency() -> usize {
    16
}

impl PipelineConfig {
    /// 拦截器超时（`None` 表示不限时）
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

impl DispatchConfig {
    /// 实际使用的并发度，0 按 1 处理
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl AppConfig {
    /// 从工作目录加载配置，并叠加环境变量覆盖
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// 从指定路径加载配置；文件不存在时仅使用默认值与环境变量
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(GuardError::Config)?;
        settings.try_deserialize().map_err(GuardError::Config)
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .map_err(GuardError::Config)?;
        settings.try_deserialize().map_err(GuardError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_returns_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.pipeline.handler_timeout_ms, None);
        assert!(!config.pipeline.log_requests);
        assert!(config.pipeline.extension_filter);
        assert_eq!(config.dispatch.concurrency, 16);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[pipeline]
handler_timeout_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(
            config.pipeline.handler_timeout(),
            Some(Duration::from_millis(250))
        );
        assert!(config.pipeline.extension_filter); // default
        assert_eq!(config.dispatch.concurrency, 16); // default
    }

    #[test]
    fn invalid_value_is_a_config_error() {
        let err = AppConfig::from_toml_str("[dispatch]\nconcurrency = \"many\"").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let dispatch = DispatchConfig::builder().concurrency(0).build();
        assert_eq!(dispatch.effective_concurrency(), 1);
    }

    #[test]
    fn builder_defaults_match_serde_defaults() {
        let built = AppConfig::builder().build();
        assert_eq!(built.log.level, "info");
        assert!(built.pipeline.extension_filter);
        assert_eq!(built.dispatch.concurrency, 16);

        let pipeline = PipelineConfig::builder().handler_timeout_ms(10).build();
        assert_eq!(pipeline.handler_timeout(), Some(Duration::from_millis(10)));
        assert!(pipeline.extension_filter);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("definitely/not/here.toml")).unwrap();
        assert!(config.pipeline.extension_filter);
    }
}
