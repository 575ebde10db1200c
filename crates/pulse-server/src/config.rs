use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// 入站订阅主题
    #[serde(default = "default_sub_key")]
    pub sub_key: String,

    /// 出站发布主题
    #[serde(default = "default_pub_key")]
    pub pub_key: String,

    /// 窗口周期（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    #[serde(default)]
    pub mode: BridgeMode,

    /// 直通模式的前缀变换
    #[serde(default = "default_relay_prefix")]
    pub relay_prefix: String,

    /// 记录发布者匹配状态变化
    #[serde(default)]
    pub matching_listener: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BridgeMode {
    /// 窗口平均：缓冲采样，按周期发布汇总
    #[default]
    Average,

    /// 直通中继：逐条前缀变换后立即转发
    Relay,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

// 默认值函数
fn default_bus_capacity() -> usize {
    1024
}

fn default_sub_key() -> String {
    "demo/example/sensor".to_string()
}

fn default_pub_key() -> String {
    "demo/avg/output".to_string()
}

fn default_interval_secs() -> f64 {
    5.0
}

fn default_relay_prefix() -> String {
    "REPUB: ".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_listen() -> String {
    "127.0.0.1:9100".to_string()
}

// Default trait 实现
impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sub_key: default_sub_key(),
            pub_key: default_pub_key(),
            interval_secs: default_interval_secs(),
            mode: BridgeMode::default(),
            relay_prefix: default_relay_prefix(),
            matching_listener: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从 TOML 文件加载配置；文件不存在时返回默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.bridge.interval_secs <= 0.0 {
            return Err(anyhow!(
                "bridge.interval_secs ({}) must be greater than 0",
                self.bridge.interval_secs
            ));
        }

        if self.bus.capacity == 0 {
            return Err(anyhow!("bus.capacity must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.bus.capacity, 1024);
        assert_eq!(config.bridge.pub_key, "demo/avg/output");
        assert_eq!(config.bridge.interval_secs, 5.0);
        assert_eq!(config.bridge.mode, BridgeMode::Average);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[bus]
capacity = 64

[bridge]
sub_key = "plant/sensors/temp"
pub_key = "plant/avg/temp"
interval_secs = 2.5
mode = "relay"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.bus.capacity, 64);
        assert_eq!(config.bridge.sub_key, "plant/sensors/temp");
        assert_eq!(config.bridge.pub_key, "plant/avg/temp");
        assert_eq!(config.bridge.interval_secs, 2.5);
        assert_eq!(config.bridge.mode, BridgeMode::Relay);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[bridge]
interval_secs = 1.0
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.bridge.interval_secs, 1.0);
        // 未指定的字段保持默认
        assert_eq!(config.bridge.sub_key, "demo/example/sensor");
        assert_eq!(config.bus.capacity, 1024);
    }

    #[test]
    fn test_validate_rejects_bad_interval() {
        let mut config = AppConfig::default();
        config.bridge.interval_secs = 0.0;
        assert!(config.validate().is_err());

        config.bridge.interval_secs = -1.0;
        assert!(config.validate().is_err());

        config.bridge.interval_secs = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.bus.capacity = 0;
        assert!(config.validate().is_err());
    }
}
