//! Configuration for the brightness bridge.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// MQTT broker connection settings
    pub mqtt: MqttConfig,

    /// Entity identifier -> display label pattern (regular expression).
    /// Each key becomes a Home Assistant light entity.
    pub lights: HashMap<String, String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host (IP or hostname)
    pub host: String,

    /// Broker port (default: 1883)
    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT client identifier (default: "mqtt-bridge-brightness")
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds (default: 30)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Delay between reconnect attempts in seconds (default: 5)
    #[serde(default = "default_reconnect")]
    pub reconnect_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqtt-bridge-brightness".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_reconnect() -> u64 {
    5
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A configured entity with its compiled label pattern.
#[derive(Debug, Clone)]
pub struct LightPattern {
    /// Entity identifier (the config key)
    pub entity: String,
    /// Compiled label-matching pattern
    pub pattern: Regex,
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Validation(
                "MQTT broker host cannot be empty".to_string(),
            ));
        }

        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "MQTT client id cannot be empty".to_string(),
            ));
        }

        if self.lights.is_empty() {
            return Err(ConfigError::Validation(
                "At least one light must be configured".to_string(),
            ));
        }

        for (entity, pattern) in &self.lights {
            if entity.is_empty() || entity.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "Invalid entity identifier '{}' (must be non-empty, no '/')",
                    entity
                )));
            }

            if let Err(e) = Regex::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Light '{}': invalid pattern '{}': {}",
                    entity, pattern, e
                )));
            }
        }

        Ok(())
    }

    /// Compile the configured label patterns.
    ///
    /// Entries are sorted by entity identifier so discovery runs in a
    /// deterministic order.
    pub fn compiled_patterns(&self) -> Result<Vec<LightPattern>, ConfigError> {
        let mut patterns = Vec::with_capacity(self.lights.len());

        for (entity, pattern) in &self.lights {
            let pattern = Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "Light '{}': invalid pattern '{}': {}",
                    entity, pattern, e
                ))
            })?;
            patterns.push(LightPattern {
                entity: entity.clone(),
                pattern,
            });
        }

        patterns.sort_by(|a, b| a.entity.cmp(&b.entity));
        Ok(patterns)
    }
}

/// Default configuration file location under the user's config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mqtt-bridge-brightness").join("bridge.json5"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            mqtt: { host: "192.168.1.10" },
            lights: {
                laptop: "eDP.*"
            }
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.mqtt.host, "192.168.1.10");
        assert_eq!(config.mqtt.port, 1883); // default
        assert_eq!(config.mqtt.client_id, "mqtt-bridge-brightness"); // default
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.mqtt.reconnect_secs, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            mqtt: {
                host: "broker.local",
                port: 8883,
                client_id: "desk-bridge",
                keep_alive_secs: 60,
                reconnect_secs: 10
            },
            lights: {
                laptop: "eDP.*",
                external: "DP-[0-9]+"
            },
            logging: { level: "debug", format: "json" }
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.client_id, "desk-bridge");
        assert_eq!(config.lights.len(), 2);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_empty_lights() {
        let json = r#"{
            mqtt: { host: "broker.local" },
            lights: {}
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let json = r#"{
            mqtt: { host: "broker.local" },
            lights: { laptop: "eDP[" }
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_entity_with_slash() {
        let json = r#"{
            mqtt: { host: "broker.local" },
            lights: { "bad/entity": ".*" }
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compiled_patterns_sorted() {
        let json = r#"{
            mqtt: { host: "broker.local" },
            lights: {
                zulu: ".*",
                alpha: "eDP.*"
            }
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        let patterns = config.compiled_patterns().unwrap();

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].entity, "alpha");
        assert_eq!(patterns[1].entity, "zulu");
        assert!(patterns[0].pattern.is_match("eDP-1"));
    }
}
