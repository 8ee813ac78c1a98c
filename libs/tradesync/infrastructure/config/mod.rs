use crate::domain::Channel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const WS_URL_ENV: &str = "TRADESYNC_WS_URL";
pub const REST_URL_ENV: &str = "TRADESYNC_REST_URL";
pub const ACCESS_TOKEN_ENV: &str = "TRADESYNC_ACCESS_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Trading sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub stream: StreamOptions,
    #[serde(default)]
    pub rest: RestOptions,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session token from .env (not in YAML)
    #[serde(skip)]
    pub access_token: Option<String>,
}

/// Streaming connection options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    pub ws_url: String,
    /// Query parameter carrying the session token on the handshake URL
    #[serde(default = "default_credential_param")]
    pub credential_param: String,
    /// Connect as soon as a session token is available
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Initial desired subscription set
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
}

impl StreamOptions {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            credential_param: default_credential_param(),
            auto_connect: true,
            auto_reconnect: true,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            channels: default_channels(),
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "stream.ws_url must start with ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }

        if self.credential_param.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "stream.credential_param must not be empty".to_string(),
            ));
        }

        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stream.reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stream.connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// REST resync client options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestOptions {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RestOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RestOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_credential_param() -> String {
    "token".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_max_reconnect_attempts() -> usize {
    5
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Orders, Channel::Positions, Channel::Pnl]
}

fn default_timeout_secs() -> u64 {
    30
}

impl SyncConfig {
    /// Load configuration from YAML file, then apply environment overrides
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml_str(&yaml_content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(WS_URL_ENV) {
            info!("Overriding stream URL from environment variable");
            self.stream.ws_url = url;
        }

        if let Ok(url) = std::env::var(REST_URL_ENV) {
            info!("Overriding REST URL from environment variable");
            self.rest.base_url = url;
        }

        self.access_token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());
    }

    /// Session token, or an error naming the variable to set
    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing(ACCESS_TOKEN_ENV.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;

        if self.rest.is_configured()
            && !(self.rest.base_url.starts_with("http://") || self.rest.base_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "rest.base_url must start with http:// or https://, got '{}'",
                self.rest.base_url
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Stream URL: {}", self.stream.ws_url);
        info!(
            "  Auto connect: {}, auto reconnect: {} ({} ms, max {} attempts)",
            self.stream.auto_connect,
            self.stream.auto_reconnect,
            self.stream.reconnect_interval_ms,
            self.stream.max_reconnect_attempts
        );
        info!("  Channels: {:?}", self.stream.channels);
        if self.rest.is_configured() {
            info!("  REST URL: {}", self.rest.base_url);
        } else {
            info!("  REST URL: (not configured, resync disabled)");
        }
        info!("  Session token: {}", if self.access_token.is_some() { "present" } else { "absent" });
        info!("  Log level: {}", self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = SyncConfig::from_yaml_str(
            r#"
stream:
  ws_url: "wss://feed.example.com/ws/trading"
"#,
        )
        .unwrap();

        assert_eq!(config.stream.credential_param, "token");
        assert!(config.stream.auto_connect);
        assert!(config.stream.auto_reconnect);
        assert_eq!(config.stream.reconnect_interval(), Duration::from_millis(3000));
        assert_eq!(config.stream.max_reconnect_attempts, 5);
        assert_eq!(
            config.stream.channels,
            vec![Channel::Orders, Channel::Positions, Channel::Pnl]
        );
        assert!(!config.rest.is_configured());
        assert_eq!(config.log_level, "info");
        assert!(config.access_token.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_yaml() {
        let config = SyncConfig::from_yaml_str(
            r#"
stream:
  ws_url: "ws://localhost:8000/ws"
  credential_param: "access_token"
  auto_connect: false
  auto_reconnect: false
  reconnect_interval_ms: 500
  max_reconnect_attempts: 2
  connect_timeout_ms: 2000
  channels: [orders, all]
rest:
  base_url: "http://localhost:8000/api"
  timeout_secs: 5
log_level: debug
"#,
        )
        .unwrap();

        assert_eq!(config.stream.credential_param, "access_token");
        assert!(!config.stream.auto_connect);
        assert_eq!(config.stream.channels, vec![Channel::Orders, Channel::All]);
        assert_eq!(config.rest.timeout(), Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SyncConfig::from_yaml_str("stream:\n  ws_url: \"http://wrong\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.stream.ws_url = "ws://ok".into();
        config.stream.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());

        config.stream.reconnect_interval_ms = 100;
        config.log_level = "verbose".into();
        assert!(config.validate().is_err());

        config.log_level = "warn".into();
        config.rest.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_channel_is_a_parse_error() {
        let result = SyncConfig::from_yaml_str(
            "stream:\n  ws_url: \"ws://x\"\n  channels: [orders, trades]\n",
        );
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stream:\n  ws_url: \"ws://127.0.0.1:9000/ws\"\nlog_level: trace").unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_missing_file() {
        let result = SyncConfig::load("/nonexistent/sync_config.yaml");
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }
}
