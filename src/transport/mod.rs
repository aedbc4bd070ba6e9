//! Transport abstraction for reaching the telemetry gateway.
//!
//! A [`Connector`] establishes connections to an [`Endpoint`]; each
//! [`Connection`] then yields inbound frames until the peer goes away.
//! The session layer owns reconnection; transports only report what
//! happened.

mod channel;
mod tcp;

pub use channel::{ChannelConnector, ConnectionFeed};
pub use tcp::{TcpConnector, DEFAULT_EVENT, MAX_FRAME_LEN};

use std::fmt;

use async_trait::async_trait;

use crate::error::{ConfigurationError, ConnectionError};

/// A gateway address in `host:port` form, with an optional `tcp://` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse an endpoint address.
    ///
    /// # Example
    ///
    /// ```
    /// use plantwatch::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("tcp://scada.local:5000").unwrap();
    /// assert_eq!(endpoint.host(), "scada.local");
    /// assert_eq!(endpoint.port(), 5000);
    /// ```
    pub fn parse(address: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::Endpoint {
            endpoint: address.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = address.trim();
        let rest = match trimmed.split_once("://") {
            Some(("tcp", rest)) => rest,
            Some((scheme, _)) => return Err(invalid(&format!("unsupported scheme '{}'", scheme))),
            None => trimmed,
        };

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        // Bracketed IPv6 literals keep their brackets out of the host name.
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if host.contains(char::is_whitespace) || host.contains('/') {
            return Err(invalid("malformed host"));
        }

        let port: u16 = port.parse().map_err(|_| invalid("port must be a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An inbound telemetry payload, untyped at the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded JSON payload; not yet checked against the telemetry shape.
    Json(serde_json::Value),
    /// A frame that could not be decoded at all, with the decoder's complaint.
    Undecodable(String),
}

/// Establishes connections to the telemetry gateway.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug + 'static {
    /// Open one connection. Dropping the returned connection releases it.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// A live connection yielding inbound frames.
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next frame.
    ///
    /// Returns `None` when the peer closed the connection and
    /// `Some(Err(_))` when it broke. Either way the connection is finished.
    async fn next_frame(&mut self) -> Option<Result<Inbound, ConnectionError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port() {
        let endpoint = Endpoint::parse("localhost:5000").unwrap();
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 5000);
        assert_eq!(endpoint.to_string(), "localhost:5000");
    }

    #[test]
    fn test_parse_scheme_and_ipv6() {
        let endpoint = Endpoint::parse("tcp://[::1]:7000").unwrap();
        assert_eq!(endpoint.host(), "::1");
        assert_eq!(endpoint.to_string(), "[::1]:7000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "localhost",
            ":5000",
            "localhost:http",
            "localhost:0",
            "localhost:70000",
            "https://scada.example:5000",
            "bad host:5000",
        ] {
            assert!(
                matches!(Endpoint::parse(bad), Err(ConfigurationError::Endpoint { .. })),
                "expected {:?} to be rejected",
                bad
            );
        }
    }
}
