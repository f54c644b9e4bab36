use crate::traits::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_max_missed_heartbeats() -> u32 {
    3
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_jitter() -> [f64; 2] {
    [0.8, 1.1]
}

/// Connection manager options
///
/// Everything except `url` has a default, so a YAML file may be as small as
/// `url: wss://collab.example.com/ws`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// WebSocket URL (ws:// or wss://)
    pub url: String,

    /// Retries allowed after consecutive failures before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Base retry delay
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_true")]
    pub use_exponential_backoff: bool,

    /// Retry automatically after an abnormal close
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Sent as an `auth` message on every open
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Ticks without an open handle before a reconnect is forced
    #[serde(default = "default_max_missed_heartbeats")]
    pub max_missed_heartbeats: u32,

    /// Backoff cap, applied before jitter
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Uniform jitter multiplier range `[low, high]`
    #[serde(default = "default_jitter")]
    pub jitter: [f64; 2],

    /// Re-send `join_session` for the active session after a reconnect
    #[serde(default = "default_true")]
    pub rejoin_session_on_reconnect: bool,
}

impl ConnectionOptions {
    /// Options with every default and the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            use_exponential_backoff: true,
            auto_reconnect: true,
            token: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_missed_heartbeats: default_max_missed_heartbeats(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            rejoin_session_on_reconnect: true,
        }
    }

    /// Load options from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: ConnectionOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "url must start with ws:// or wss://, got '{}'",
                self.url
            )));
        }

        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_delay_ms must be positive".to_string(),
            ));
        }

        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return Err(ConfigError::ValidationError(
                "max_reconnect_delay_ms must be >= reconnect_delay_ms".to_string(),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }

        if self.max_missed_heartbeats == 0 {
            return Err(ConfigError::ValidationError(
                "max_missed_heartbeats must be positive".to_string(),
            ));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        let [low, high] = self.jitter;
        if !(low > 0.0 && low <= high) {
            return Err(ConfigError::ValidationError(format!(
                "jitter must satisfy 0 < low <= high, got [{}, {}]",
                low, high
            )));
        }

        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Retry policy described by these options
    pub fn reconnection_strategy(&self) -> Box<dyn ReconnectionStrategy> {
        if self.use_exponential_backoff {
            Box::new(
                ExponentialBackoff::new(
                    self.reconnect_delay(),
                    Duration::from_millis(self.max_reconnect_delay_ms),
                    Some(self.max_reconnect_attempts),
                )
                .with_multiplier(self.backoff_multiplier)
                .with_jitter(self.jitter[0], self.jitter[1]),
            )
        } else {
            Box::new(FixedDelay::new(
                self.reconnect_delay(),
                Some(self.max_reconnect_attempts),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let options = ConnectionOptions::from_yaml_str("url: wss://collab.example.com/ws\n").unwrap();
        assert_eq!(options, ConnectionOptions::new("wss://collab.example.com/ws"));
        assert_eq!(options.max_reconnect_attempts, 10);
        assert_eq!(options.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(options.heartbeat_interval(), Duration::from_secs(30));
        assert!(options.use_exponential_backoff);
        assert!(options.auto_reconnect);
    }

    #[test]
    fn test_overrides() {
        let yaml = r#"
url: ws://localhost:9000
max_reconnect_attempts: 3
reconnect_delay_ms: 250
use_exponential_backoff: false
token: secret
jitter: [1.0, 1.0]
"#;
        let options = ConnectionOptions::from_yaml_str(yaml).unwrap();
        assert_eq!(options.max_reconnect_attempts, 3);
        assert_eq!(options.token.as_deref(), Some("secret"));

        let strategy = options.reconnection_strategy();
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(250)));
        assert_eq!(strategy.next_delay(4), None);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url: wss://collab.example.com/ws").unwrap();
        writeln!(file, "heartbeat_interval_ms: 5000").unwrap();

        let options = ConnectionOptions::load(file.path()).unwrap();
        assert_eq!(options.heartbeat_interval(), Duration::from_secs(5));

        assert!(matches!(
            ConnectionOptions::load("/nonexistent/collab.yaml"),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn test_missing_url_is_a_parse_error() {
        assert!(matches!(
            ConnectionOptions::from_yaml_str("max_reconnect_attempts: 3\n"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        let mut options = ConnectionOptions::new("http://example.com");
        assert!(options.validate().is_err());

        options.url = "ws://example.com".into();
        options.jitter = [1.2, 1.0];
        assert!(options.validate().is_err());

        options.jitter = [0.8, 1.1];
        options.max_missed_heartbeats = 0;
        assert!(options.validate().is_err());

        options.max_missed_heartbeats = 3;
        assert!(options.validate().is_ok());
    }
}
