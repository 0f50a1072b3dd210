use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::heartbeat::HeartbeatConfig;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "REGISTRY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8020".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub interval_secs: u64,
    pub probe_attempts: u32,
    pub retry_delay_ms: u64,
    // 被摘除的服务最多继续探测的轮数
    pub max_unhealthy_cycles: u32,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            probe_attempts: 3,
            retry_delay_ms: 1000,
            max_unhealthy_cycles: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    // 探测与补丁投递的请求超时
    pub request_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
        }
    }
}

// 以 REGISTRY_ 为前缀的环境变量覆盖
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    config: Option<String>,
    listen_addr: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    probe_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_unhealthy_cycles: Option<u32>,
    request_timeout_secs: Option<u64>,
}

impl Config {
    /// 读取配置文件（不存在时使用默认值），再应用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        let path = overrides
            .config
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::info!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(listen_addr) = overrides.listen_addr {
            self.server.listen_addr = listen_addr;
        }
        if let Some(interval) = overrides.heartbeat_interval_secs {
            self.heartbeat.interval_secs = interval;
        }
        if let Some(attempts) = overrides.probe_attempts {
            self.heartbeat.probe_attempts = attempts;
        }
        if let Some(delay) = overrides.retry_delay_ms {
            self.heartbeat.retry_delay_ms = delay;
        }
        if let Some(cycles) = overrides.max_unhealthy_cycles {
            self.heartbeat.max_unhealthy_cycles = cycles;
        }
        if let Some(timeout) = overrides.request_timeout_secs {
            self.delivery.request_timeout_secs = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat.probe_attempts == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat.probe_attempts must be at least 1".into(),
            ));
        }
        if self.heartbeat.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat.interval_secs must be at least 1".into(),
            ));
        }
        if self.heartbeat.max_unhealthy_cycles == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat.max_unhealthy_cycles must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(self.heartbeat.interval_secs),
            probe_attempts: self.heartbeat.probe_attempts,
            retry_delay: Duration::from_millis(self.heartbeat.retry_delay_ms),
            max_unhealthy_cycles: self.heartbeat.max_unhealthy_cycles,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.request_timeout_secs)
    }
}
