//! Client configuration.
//!
//! Settings come from an optional TOML file and `PLANTWATCH_*` environment
//! variables, environment winning:
//!
//! ```toml
//! endpoint = "gateway.plant.local:5000"
//! event = "mqtt_message"
//! reconnection = true
//! reconnection_attempts = 10
//! reconnection_delay = 2000      # milliseconds, or a string like "2s"
//! connect_timeout = "10s"
//! min_interval = "10s"
//! ```
//!
//! ```bash
//! PLANTWATCH_ENDPOINT=10.0.0.7:5000 PLANTWATCH_MIN_INTERVAL=1m plantwatch
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::duration::parse_duration;
use crate::error::ConfigurationError;
use crate::session::SessionOptions;
use crate::transport::{Endpoint, TcpConnector, DEFAULT_EVENT};

pub const DEFAULT_ENDPOINT: &str = "localhost:5000";

/// A duration given either as milliseconds or as a unit string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Millis(u64),
    Text(String),
}

impl DurationValue {
    fn resolve(&self) -> Result<Duration, ConfigurationError> {
        match self {
            DurationValue::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationValue::Text(s) => parse_duration(s),
        }
    }
}

/// Raw settings as they appear in the file and environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: String,
    pub event: String,
    pub reconnection: bool,
    pub reconnection_attempts: u32,
    pub reconnection_delay: DurationValue,
    pub connect_timeout: String,
    pub min_interval: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            event: DEFAULT_EVENT.to_string(),
            reconnection: true,
            reconnection_attempts: 10,
            reconnection_delay: DurationValue::Millis(2000),
            connect_timeout: "10s".to_string(),
            min_interval: "10s".to_string(),
        }
    }
}

/// Validated client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway address, `host:port` with an optional `tcp://` scheme.
    pub endpoint: String,
    /// Name of the envelope event that carries telemetry.
    pub event: String,
    pub session: SessionOptions,
    pub connect_timeout: Duration,
    /// Minimum time between two accepted readings.
    pub min_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            event: DEFAULT_EVENT.to_string(),
            session: SessionOptions::default(),
            connect_timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Load from `path` (if given) and the `PLANTWATCH_*` environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_env(path, Environment::with_prefix("PLANTWATCH"))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let raw: FileConfig = builder
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Self::try_from(raw)
    }

    /// Check everything `open` would otherwise reject later.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        Endpoint::parse(&self.endpoint)?;
        self.session.validate()?;

        if self.event.trim().is_empty() {
            return Err(ConfigurationError::Option {
                option: "event",
                reason: "must not be empty".to_string(),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigurationError::Option {
                option: "connect_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// The TCP transport described by this configuration.
    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(self.event.clone(), self.connect_timeout)
    }
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigurationError;

    fn try_from(raw: FileConfig) -> Result<Self, Self::Error> {
        let config = ClientConfig {
            endpoint: raw.endpoint,
            event: raw.event,
            session: SessionOptions {
                reconnect: raw.reconnection,
                max_reconnect_attempts: raw.reconnection_attempts,
                reconnect_delay: raw.reconnection_delay.resolve()?,
            },
            connect_timeout: parse_duration(&raw.connect_timeout)?,
            min_interval: parse_duration(&raw.min_interval)?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("PLANTWATCH").source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.min_interval, Duration::from_secs(10));
        assert_eq!(config.session.reconnect_delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_load_file() {
        let file = toml_file(
            r#"
            endpoint = "tcp://10.0.0.7:5001"
            reconnection = false
            reconnection_attempts = 3
            reconnection_delay = 500
            min_interval = "1m"
            "#,
        );

        let config = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.endpoint, "tcp://10.0.0.7:5001");
        assert!(!config.session.reconnect);
        assert_eq!(config.session.max_reconnect_attempts, 3);
        assert_eq!(config.session.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.min_interval, Duration::from_secs(60));
        assert_eq!(config.event, DEFAULT_EVENT);
    }

    #[test]
    fn test_delay_as_string() {
        let file = toml_file(r#"reconnection_delay = "1.5s""#);
        let config = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.session.reconnect_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file(r#"endpoint = "gateway:5000""#);
        let config = ClientConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("PLANTWATCH_ENDPOINT", "backup:6000"),
                ("PLANTWATCH_MIN_INTERVAL", "30s"),
                ("PLANTWATCH_RECONNECTION_ATTEMPTS", "4"),
            ]),
        )
        .unwrap();

        assert_eq!(config.endpoint, "backup:6000");
        assert_eq!(config.min_interval, Duration::from_secs(30));
        assert_eq!(config.session.max_reconnect_attempts, 4);
    }

    #[test]
    fn test_invalid_values() {
        let bad_endpoint = toml_file(r#"endpoint = "http://gateway:5000""#);
        assert!(matches!(
            ClientConfig::load_with_env(Some(bad_endpoint.path()), env(&[])),
            Err(ConfigurationError::Endpoint { .. })
        ));

        let bad_duration = toml_file(r#"min_interval = "soon""#);
        assert!(matches!(
            ClientConfig::load_with_env(Some(bad_duration.path()), env(&[])),
            Err(ConfigurationError::Duration(_))
        ));

        let zero_delay = toml_file("reconnection_delay = 0");
        assert!(matches!(
            ClientConfig::load_with_env(Some(zero_delay.path()), env(&[])),
            Err(ConfigurationError::Option { option: "reconnection_delay", .. })
        ));

        // Zero delay is fine when nothing will reconnect
        let no_reconnect = toml_file("reconnection = false\nreconnection_delay = 0");
        assert!(ClientConfig::load_with_env(Some(no_reconnect.path()), env(&[])).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = ClientConfig::load_with_env(Some(Path::new("/nonexistent/plantwatch.toml")), env(&[]));
        assert!(matches!(result, Err(ConfigurationError::Load(_))));
    }

    #[test]
    fn test_validate() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.event = " ".to_string();
        assert!(config.validate().is_err());

        config.event = DEFAULT_EVENT.to_string();
        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
