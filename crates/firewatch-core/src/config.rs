//! Configuration loading and typed config structures for the sensor hub.
//!
//! The configuration lives in `firewatch-config.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure, and provides a
//! loader that reads and validates the file. Every section and field has
//! a default, so an absent file or a partial file is fine.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level hub configuration.
///
/// Mirrors the structure of `firewatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FireConfig {
    /// HTTP listener and page assets.
    #[serde(default)]
    pub server: ServerConfig,

    /// History, fan-out and handoff sizing.
    #[serde(default)]
    pub hub: HubConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FireConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `FIREWATCH_HOST` overrides `server.host`
    /// - `FIREWATCH_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.server.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Only the YAML is consulted; environment overrides are applied by
    /// [`from_file`](Self::from_file).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero_checks: [(&'static str, bool); 4] = [
            ("hub.history_capacity", self.hub.history_capacity == 0),
            ("hub.send_timeout_ms", self.hub.send_timeout_ms == 0),
            ("hub.handoff_capacity", self.hub.handoff_capacity == 0),
            ("hub.subscriber_buffer", self.hub.subscriber_buffer == 0),
        ];
        for (field, is_zero) in zero_checks {
            if is_zero {
                return Err(ConfigError::Invalid {
                    field,
                    reason: String::from("must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}

/// HTTP listener and page asset locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served under `/static`; disabled when unset.
    #[serde(default)]
    pub static_dir: Option<String>,

    /// Directory holding `dashboard.html` and `fire_alert.html` overrides.
    /// The embedded templates are used when unset.
    #[serde(default)]
    pub template_dir: Option<String>,
}

impl ServerConfig {
    /// Override listener settings with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `FIREWATCH_PORT` is not a port
    /// number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("FIREWATCH_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("FIREWATCH_PORT") {
            self.port = val.parse().map_err(|e| ConfigError::Invalid {
                field: "server.port",
                reason: format!("FIREWATCH_PORT={val}: {e}"),
            })?;
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            template_dir: None,
        }
    }
}

/// History, fan-out and handoff sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Number of readings kept in the rolling history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Upper bound on one delivery attempt to one subscriber.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Capacity of the queue between ingestion and the dispatcher.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    /// Outbound messages buffered per subscriber before sends start waiting.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl HubConfig {
    /// The send timeout as a [`Duration`].
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
            handoff_capacity: default_handoff_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

const fn default_history_capacity() -> usize {
    100
}

const fn default_send_timeout_ms() -> u64 {
    1000
}

const fn default_handoff_capacity() -> usize {
    1024
}

const fn default_subscriber_buffer() -> usize {
    32
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FireConfig::default();
        assert_eq!(config.hub.history_capacity, 100);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9001
  static_dir: "static"
  template_dir: "templates"

hub:
  history_capacity: 50
  send_timeout_ms: 250
  handoff_capacity: 64
  subscriber_buffer: 8

logging:
  level: "debug"
  json: true
"#;

        let config = FireConfig::parse(yaml);
        assert!(config.is_ok(), "parse failed: {config:?}");
        let config = config.ok().unwrap_or_default();

        // Listener values come from the YAML alone, whatever the process
        // environment holds.
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.static_dir.as_deref(), Some("static"));
        assert_eq!(config.server.template_dir.as_deref(), Some("templates"));
        assert_eq!(config.hub.history_capacity, 50);
        assert_eq!(config.hub.send_timeout(), Duration::from_millis(250));
        assert_eq!(config.hub.handoff_capacity, 64);
        assert_eq!(config.hub.subscriber_buffer, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "hub:\n  history_capacity: 10\n";
        let config = FireConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        // Capacity is overridden
        assert_eq!(config.hub.history_capacity, 10);
        // Everything else uses defaults
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.hub.send_timeout_ms, 1000);
        assert_eq!(config.hub.subscriber_buffer, 32);
        assert!(!config.logging.json);
    }

    #[test]
    fn zero_history_capacity_is_rejected() {
        let yaml = "hub:\n  history_capacity: 0\n";
        let result = FireConfig::parse(yaml);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "hub.history_capacity",
                ..
            })
        ));
    }

    #[test]
    fn zero_send_timeout_is_rejected() {
        let mut config = FireConfig::default();
        config.hub.send_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = FireConfig::parse("hub: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("firewatch-config.yaml");
        if path.exists() {
            let config = FireConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
