//! 统一配置中心
//!
//! 提供中继服务的全局配置，包括：
//! - 监听地址
//! - 各类动作的限流规则、封禁时长、单来源连接上限
//! - 消息历史容量
//!
//! 加载顺序：默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，以 `__` 分隔层级）。

use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub limits: LimitsConfig,
    #[serde(default)]
    #[validate(nested)]
    pub history: HistoryConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// 是否信任 `X-Forwarded-For` 头作为来源地址（仅在反向代理之后开启）
    #[serde(default, alias = "trustForwardedFor")]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            trust_forwarded_for: false,
        }
    }
}

/// 单条固定窗口限流规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RateLimitRule {
    #[serde(alias = "windowSeconds")]
    #[validate(range(min = 1))]
    pub window_seconds: u64,
    #[validate(range(min = 1))]
    pub limit: u32,
}

impl RateLimitRule {
    pub const fn new(window_seconds: u64, limit: u32) -> Self {
        Self {
            window_seconds,
            limit,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// 防滥用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LimitsConfig {
    #[validate(nested)]
    pub connect: RateLimitRule,
    #[serde(alias = "changeName")]
    #[validate(nested)]
    pub change_name: RateLimitRule,
    #[serde(alias = "sendMessage")]
    #[validate(nested)]
    pub send_message: RateLimitRule,
    #[serde(alias = "getHistory")]
    #[validate(nested)]
    pub get_history: RateLimitRule,
    #[serde(alias = "banDurationSeconds")]
    #[validate(range(min = 1))]
    pub ban_duration_seconds: u64,
    #[serde(alias = "maxConnectionsPerOrigin")]
    #[validate(range(min = 1))]
    pub max_connections_per_origin: usize,
}

impl LimitsConfig {
    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_seconds)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connect: RateLimitRule::new(60, 20),
            change_name: RateLimitRule::new(60, 10),
            send_message: RateLimitRule::new(10, 30),
            get_history: RateLimitRule::new(60, 20),
            ban_duration_seconds: 300,
            max_connections_per_origin: 5,
        }
    }
}

/// 消息历史配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HistoryConfig {
    /// 内存中保留的最大消息条数
    #[validate(range(min = 1))]
    pub capacity: usize,
    /// 改名时是否同步改写历史消息中的作者名
    #[serde(default = "default_true", alias = "propagateRenames")]
    pub propagate_renames: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            propagate_renames: true,
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig = fig.merge(Env::prefixed("APP_").split("__"));

        let cfg: AppConfig = fig.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 从 TOML/YAML/JSON 字符串解析；按简单特征自动识别格式
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = if s.trim_start().starts_with('{') {
            serde_json::from_str(s)?
        } else if s.contains('[') || s.contains('=') {
            toml::from_str(s)?
        } else {
            serde_yaml::from_str(s)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
