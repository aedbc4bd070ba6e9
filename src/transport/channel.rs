//! Channel-based transport.
//!
//! Connections are scripted in advance and their frames are pushed through
//! tokio channels. This is useful for embedding the client behind another
//! message source, and for driving the session deterministically in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use super::{Connection, Connector, Endpoint, Inbound};
use crate::error::ConnectionError;

type FrameResult = Result<Inbound, ConnectionError>;

#[derive(Debug)]
enum Scripted {
    Accept(mpsc::UnboundedReceiver<FrameResult>),
    Refuse(String),
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<VecDeque<Scripted>>,
    attempts: AtomicUsize,
    scripted: Notify,
}

/// A connector whose connect attempts are decided by the caller.
///
/// Each call to `connect` consumes the next scripted outcome in order.
/// When nothing is scripted the attempt waits until something is.
///
/// # Example
///
/// ```
/// use plantwatch::ChannelConnector;
///
/// let connector = ChannelConnector::new();
/// connector.refuse_next("gateway rebooting");
/// let feed = connector.accept_next();
///
/// feed.send_json(serde_json::json!({ "timestamp": "t0" }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChannelConnector {
    inner: Arc<Inner>,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next connect attempt to succeed.
    ///
    /// Returns the feed for pushing frames into that connection.
    pub fn accept_next(&self) -> ConnectionFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Scripted::Accept(rx));
        ConnectionFeed { tx }
    }

    /// Script the next connect attempt to fail.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.push(Scripted::Refuse(reason.into()));
    }

    /// Number of connect attempts made so far.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    fn push(&self, outcome: Scripted) {
        self.inner.script.lock().push_back(outcome);
        self.inner.scripted.notify_one();
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, ConnectionError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        loop {
            let next = self.inner.script.lock().pop_front();
            match next {
                Some(Scripted::Accept(rx)) => return Ok(Box::new(ChannelConnection { rx })),
                Some(Scripted::Refuse(reason)) => {
                    return Err(ConnectionError::Connect {
                        endpoint: endpoint.to_string(),
                        reason,
                    })
                }
                None => self.inner.scripted.notified().await,
            }
        }
    }
}

/// The sending side of a scripted connection.
///
/// Dropping the feed closes the connection from the gateway side.
#[derive(Debug, Clone)]
pub struct ConnectionFeed {
    tx: mpsc::UnboundedSender<FrameResult>,
}

impl ConnectionFeed {
    /// Push a JSON payload. Returns `false` if the client already let go
    /// of the connection.
    pub fn send_json(&self, payload: serde_json::Value) -> bool {
        self.send(Inbound::Json(payload))
    }

    pub fn send(&self, frame: Inbound) -> bool {
        self.tx.send(Ok(frame)).is_ok()
    }

    /// Break the connection with a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.tx.send(Err(ConnectionError::Lost(reason.into()))).is_ok()
    }

    /// Whether the client has released this connection.
    pub fn is_released(&self) -> bool {
        self.tx.is_closed()
    }
}

struct ChannelConnection {
    rx: mpsc::UnboundedReceiver<FrameResult>,
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn next_frame(&mut self) -> Option<FrameResult> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endpoint() -> Endpoint {
        Endpoint::parse("gateway:5000").unwrap()
    }

    #[tokio::test]
    async fn test_outcomes_in_order() {
        let connector = ChannelConnector::new();
        connector.refuse_next("down");
        let feed = connector.accept_next();

        let first = connector.connect(&endpoint()).await;
        assert!(matches!(first, Err(ConnectionError::Connect { .. })));

        let mut conn = connector.connect(&endpoint()).await.unwrap();
        assert!(feed.send_json(serde_json::json!(1)));
        let frame = conn.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, Inbound::Json(serde_json::json!(1)));

        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_dropping_feed_closes_connection() {
        let connector = ChannelConnector::new();
        let feed = connector.accept_next();
        let mut conn = connector.connect(&endpoint()).await.unwrap();

        drop(feed);
        assert!(conn.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_connection_releases_feed() {
        let connector = ChannelConnector::new();
        let feed = connector.accept_next();
        let conn = connector.connect(&endpoint()).await.unwrap();

        assert!(!feed.is_released());
        drop(conn);
        assert!(feed.is_released());
        assert!(!feed.send_json(serde_json::json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unscripted_connect_waits() {
        let connector = ChannelConnector::new();

        let ep = endpoint();
        let pending = tokio::time::timeout(Duration::from_secs(5), connector.connect(&ep));
        assert!(pending.await.is_err());

        let waiting = {
            let connector = connector.clone();
            tokio::spawn(async move { connector.connect(&endpoint()).await.is_ok() })
        };
        tokio::task::yield_now().await;
        let _feed = connector.accept_next();
        assert!(waiting.await.unwrap());
    }
}
