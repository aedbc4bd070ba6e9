//! Error types for the telemetry client.
//!
//! Only [`ConfigurationError`] is ever returned to a caller. Connection and
//! data-format errors are handled inside the client: they are logged,
//! counted, and show up to consumers as a status change or an unchanged
//! snapshot.

use std::time::Duration;

use plantwatch_types::IncompleteReading;
use thiserror::Error;

/// A transport-level failure. Never fatal; triggers the reconnect policy.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The gateway could not be reached.
    #[error("Connection to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The connect handshake did not finish in time.
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// An established connection broke.
    #[error("Connection lost: {0}")]
    Lost(String),
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::Lost(err.to_string())
    }
}

/// An inbound payload that cannot become a reading. The message is dropped.
#[derive(Debug, Error)]
pub enum DataFormatError {
    /// The frame was not JSON at all.
    #[error("Undecodable frame: {0}")]
    Undecodable(String),

    /// JSON, but not the telemetry shape (wrong types, missing timestamp, ...).
    #[error("Payload does not match the telemetry schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// Telemetry shape, but required channels are absent.
    #[error(transparent)]
    Incomplete(#[from] IncompleteReading),
}

/// Invalid endpoint or options. Fails the `open`/`start` call that received them.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("Invalid value for {option}: {reason}")]
    Option { option: &'static str, reason: String },

    #[error("Unknown duration format: {0}")]
    Duration(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
