//! TCP transport.
//!
//! The gateway speaks newline-delimited JSON event envelopes:
//!
//! ```text
//! {"event":"mqtt_message","data":{"timestamp":"...","offtake":{...}}}
//! ```
//!
//! Only envelopes carrying the configured event name are surfaced. A line
//! that is not a JSON envelope (bad UTF-8 included) or is longer than
//! [`MAX_FRAME_LEN`] becomes [`Inbound::Undecodable`]; only socket errors
//! end the connection.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use super::{Connection, Connector, Endpoint, Inbound};
use crate::error::ConnectionError;

/// Event name the gateway uses for telemetry frames.
pub const DEFAULT_EVENT: &str = "mqtt_message";

/// Longest line accepted from the gateway, newline included.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Connects to the gateway over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    event: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector surfacing frames for `event`.
    pub fn new(event: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            event: event.into(),
            connect_timeout,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT, Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, ConnectionError> {
        let connect = TcpStream::connect((endpoint.host(), endpoint.port()));

        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ConnectionError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout: self.connect_timeout,
                })
            }
        };
        stream.set_nodelay(true).ok();

        Ok(Box::new(TcpConnection {
            reader: BufReader::new(stream),
            event: self.event.clone(),
            line: Vec::new(),
            discarding: false,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

struct TcpConnection {
    reader: BufReader<TcpStream>,
    event: String,
    line: Vec<u8>,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn next_frame(&mut self) -> Option<Result<Inbound, ConnectionError>> {
        loop {
            self.line.clear();
            let mut limited = (&mut self.reader).take(MAX_FRAME_LEN as u64);
            match limited.read_until(b'\n', &mut self.line).await {
                // EOF
                Ok(0) => return None,
                Ok(_) => {
                    let complete = self.line.ends_with(b"\n");
                    if self.discarding {
                        self.discarding = !complete;
                        continue;
                    }
                    if !complete && self.line.len() >= MAX_FRAME_LEN {
                        self.discarding = true;
                        return Some(Ok(Inbound::Undecodable(format!(
                            "frame exceeds {} bytes",
                            MAX_FRAME_LEN
                        ))));
                    }

                    let line = self.line.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_slice::<Envelope>(line) {
                        Ok(envelope) if envelope.event == self.event => {
                            return Some(Ok(Inbound::Json(envelope.data)));
                        }
                        Ok(envelope) => {
                            debug!(event = %envelope.event, "Skipping unrelated gateway event");
                        }
                        Err(e) => return Some(Ok(Inbound::Undecodable(e.to_string()))),
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
