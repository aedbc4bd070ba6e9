//! Transport session: one logical connection to the telemetry gateway.
//!
//! A session is a small state machine driven by a single tokio task:
//!
//! ```text
//!            Opened            ConnectSucceeded
//!   Idle ───────────▶ Connecting ───────────────▶ Connected
//!    ▲                 │    ▲                         │
//!    │   ConnectFailed │    │ DelayElapsed            │ ConnectionLost
//!    │   (exhausted)   ▼    │                         ▼
//!    └──────────────  ReconnectWait ◀─────────────────┘
//!
//!   any state ── Closed ──▶ Closed
//! ```
//!
//! Every event of a session ([`SessionEvent`]) is emitted from that task,
//! one at a time and in order, so status changes and message delivery can
//! never interleave. The task also writes the connection status into the
//! [`SnapshotStore`] before announcing the event.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use plantwatch_types::ConnectionStatus;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ConfigurationError;
use crate::store::{ReadingWriter, SnapshotStore, StatusWriter};
use crate::transport::{Connection, Connector, Endpoint, Inbound};

/// Identity of one `open` of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reconnection settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Reconnect automatically after a failed connect or a lost connection.
    pub reconnect: bool,
    /// How many reconnect attempts to make before giving up.
    pub max_reconnect_attempts: u32,
    /// Fixed wait before each reconnect attempt.
    pub reconnect_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            max_reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.reconnect && self.reconnect_delay.is_zero() {
            return Err(ConfigurationError::Option {
                option: "reconnection_delay",
                reason: "must be greater than zero when reconnection is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not running; either never opened or reconnect attempts exhausted.
    Idle,
    /// A connect attempt is in flight. `attempt` 0 is the initial connect.
    Connecting { attempt: u32 },
    Connected,
    /// Waiting out the reconnect delay before attempt number `attempt`.
    ReconnectWait { attempt: u32 },
    /// Closed by the owner.
    Closed,
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    ConnectSucceeded,
    ConnectFailed,
    ConnectionLost,
    DelayElapsed,
    Closed,
}

impl SessionState {
    /// The transition table.
    pub fn next(self, transition: Transition, options: &SessionOptions) -> SessionState {
        use SessionState::*;

        match (self, transition) {
            (_, Transition::Closed) => Closed,
            (Idle, Transition::Opened) => Connecting { attempt: 0 },
            (Connecting { .. }, Transition::ConnectSucceeded) => Connected,
            (Connecting { attempt }, Transition::ConnectFailed) => {
                if options.reconnect && attempt < options.max_reconnect_attempts {
                    ReconnectWait {
                        attempt: attempt + 1,
                    }
                } else {
                    Idle
                }
            }
            (Connected, Transition::ConnectionLost) => {
                if options.reconnect && options.max_reconnect_attempts > 0 {
                    ReconnectWait { attempt: 1 }
                } else {
                    Idle
                }
            }
            (ReconnectWait { attempt }, Transition::DelayElapsed) => Connecting { attempt },
            (state, _) => state,
        }
    }

    /// Whether the session task is still working (connecting, connected,
    /// or waiting to reconnect).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting { .. }
                | SessionState::Connected
                | SessionState::ReconnectWait { .. }
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Connecting { attempt: 0 } => f.write_str("connecting"),
            SessionState::Connecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            SessionState::Connected => f.write_str("connected"),
            SessionState::ReconnectWait { attempt } => {
                write!(f, "waiting to reconnect (attempt {})", attempt)
            }
            SessionState::Closed => f.write_str("closed"),
        }
    }
}

/// Lifecycle events surfaced by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A connection was established. Fired once per connection.
    Connected,
    /// The established connection went away.
    Disconnected { reason: String },
    /// A frame arrived on the established connection.
    Message(Inbound),
}

/// Receives the events of a session, in order, on the session's task.
pub trait EventSink: Send + 'static {
    fn deliver(&mut self, session: SessionId, event: SessionEvent);
}

impl EventSink for mpsc::UnboundedSender<(SessionId, SessionEvent)> {
    fn deliver(&mut self, session: SessionId, event: SessionEvent) {
        let _ = self.send((session, event));
    }
}

/// Owns at most one live session with the gateway.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use plantwatch::{SessionOptions, SnapshotStore, TcpConnector, TransportSession};
/// use plantwatch_types::TelemetryReading;
/// use tokio::sync::mpsc;
///
/// # tokio_test::block_on(async {
/// let store = SnapshotStore::new(TelemetryReading::baseline());
/// let mut session = TransportSession::new(Arc::new(TcpConnector::default()));
/// let (tx, mut events) = mpsc::unbounded_channel();
///
/// session
///     .open("localhost:5000", SessionOptions::default(), &store, |_readings| tx)
///     .unwrap();
///
/// while let Some((_, event)) = events.recv().await {
///     println!("{:?}", event);
/// }
/// # });
/// ```
pub struct TransportSession {
    connector: Arc<dyn Connector>,
    next_id: u64,
    active: Option<ActiveSession>,
    closed: bool,
}

impl TransportSession {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            next_id: 1,
            active: None,
            closed: false,
        }
    }

    /// Open a session to `endpoint` unless one is already running.
    ///
    /// Claims `store` for the new session. `make_sink` receives the reading
    /// writer and returns the sink that will get the session's events.
    /// Returns the new session's id, or `None` when a session was already
    /// running (in which case nothing changes). Must be called from within
    /// a tokio runtime.
    pub fn open<S, F>(
        &mut self,
        endpoint: &str,
        options: SessionOptions,
        store: &SnapshotStore,
        make_sink: F,
    ) -> Result<Option<SessionId>, ConfigurationError>
    where
        S: EventSink,
        F: FnOnce(ReadingWriter) -> S,
    {
        if self.is_open() {
            return Ok(None);
        }

        let endpoint = Endpoint::parse(endpoint)?;
        options.validate()?;

        // An exhausted session is finished; let it go before starting anew.
        self.active = None;

        let id = SessionId::new(self.next_id);
        self.next_id += 1;

        let (status, readings) = store.claim(id);
        let sink = make_sink(readings);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) =
            watch::channel(SessionState::Idle.next(Transition::Opened, &options));

        info!(session = %id, endpoint = %endpoint, "Opening session");

        let task = tokio::spawn(run(
            id,
            endpoint,
            options,
            self.connector.clone(),
            status,
            sink,
            stop_rx,
            state_tx,
        ));

        self.active = Some(ActiveSession {
            id,
            store: store.clone(),
            stop_tx,
            state: state_rx,
            task,
        });
        self.closed = false;

        Ok(Some(id))
    }

    /// Close the session.
    ///
    /// Cancels any pending reconnect delay or in-flight connect attempt and
    /// releases the connection. Once this returns, the session delivers no
    /// further events and cannot write to the store. Closing an already
    /// closed session does nothing.
    pub async fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.shutdown().await;
            info!(session = %active.id, "Session closed");
            self.closed = true;
        }
    }

    /// Whether a session task is running.
    pub fn is_open(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| !active.task.is_finished())
            .unwrap_or(false)
    }

    /// The current state of the session.
    pub fn state(&self) -> SessionState {
        match &self.active {
            Some(active) => *active.state.borrow(),
            None if self.closed => SessionState::Closed,
            None => SessionState::Idle,
        }
    }

    /// A watch receiver following the session state, if a session was opened.
    pub fn watch_state(&self) -> Option<watch::Receiver<SessionState>> {
        self.active.as_ref().map(|active| active.state.clone())
    }

    /// Id of the most recently opened session, while it is held.
    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|active| active.id)
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("connector", &self.connector)
            .field("session", &self.session_id())
            .field("state", &self.state())
            .finish()
    }
}

/// A running session task and everything needed to stop it.
///
/// Dropping it without `shutdown` still releases the store and aborts the
/// task, which drops the connection.
struct ActiveSession {
    id: SessionId,
    store: SnapshotStore,
    stop_tx: watch::Sender<bool>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl ActiveSession {
    async fn shutdown(&mut self) {
        self.store.release(self.id);
        let _ = self.stop_tx.send(true);

        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                warn!(session = %self.id, "Session task panicked");
            }
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.store.release(self.id);
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

/// Resolves once the owner asks the session to stop (or goes away).
async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// What one turn of the session loop produced.
enum Step {
    Transition(Transition),
    Frame(Inbound),
}

#[allow(clippy::too_many_arguments)]
async fn run<S: EventSink>(
    id: SessionId,
    endpoint: Endpoint,
    options: SessionOptions,
    connector: Arc<dyn Connector>,
    status: StatusWriter,
    mut sink: S,
    mut stop: watch::Receiver<bool>,
    state_tx: watch::Sender<SessionState>,
) {
    let mut state = SessionState::Idle.next(Transition::Opened, &options);
    let mut connection: Option<Box<dyn Connection>> = None;
    let mut lost_reason = String::new();

    while state.is_active() {
        state_tx.send_replace(state);

        let step = match state {
            SessionState::Connecting { attempt } => {
                debug!(session = %id, attempt, "Connecting to {}", endpoint);
                tokio::select! {
                    _ = stopped(&mut stop) => Step::Transition(Transition::Closed),
                    result = connector.connect(&endpoint) => match result {
                        Ok(conn) => {
                            connection = Some(conn);
                            Step::Transition(Transition::ConnectSucceeded)
                        }
                        Err(e) => {
                            warn!(session = %id, attempt, error = %e, "Connect attempt failed");
                            Step::Transition(Transition::ConnectFailed)
                        }
                    },
                }
            }
            SessionState::Connected => match connection.as_mut() {
                Some(conn) => tokio::select! {
                    _ = stopped(&mut stop) => Step::Transition(Transition::Closed),
                    frame = conn.next_frame() => match frame {
                        Some(Ok(inbound)) => Step::Frame(inbound),
                        Some(Err(e)) => {
                            warn!(session = %id, error = %e, "Connection to gateway lost");
                            lost_reason = e.to_string();
                            Step::Transition(Transition::ConnectionLost)
                        }
                        None => {
                            info!(session = %id, "Gateway closed the connection");
                            lost_reason = "closed by gateway".to_string();
                            Step::Transition(Transition::ConnectionLost)
                        }
                    },
                },
                None => Step::Transition(Transition::ConnectionLost),
            },
            SessionState::ReconnectWait { attempt } => {
                debug!(
                    session = %id,
                    attempt,
                    delay = ?options.reconnect_delay,
                    "Waiting before reconnect"
                );
                tokio::select! {
                    _ = stopped(&mut stop) => Step::Transition(Transition::Closed),
                    _ = tokio::time::sleep(options.reconnect_delay) => {
                        Step::Transition(Transition::DelayElapsed)
                    }
                }
            }
            SessionState::Idle | SessionState::Closed => break,
        };

        let transition = match step {
            Step::Frame(inbound) => {
                sink.deliver(id, SessionEvent::Message(inbound));
                continue;
            }
            Step::Transition(transition) => transition,
        };

        let next = state.next(transition, &options);

        if next == SessionState::Connected {
            info!(session = %id, endpoint = %endpoint, "Connected to gateway");
            status.set(ConnectionStatus::Connected);
            sink.deliver(id, SessionEvent::Connected);
        } else if state == SessionState::Connected {
            connection = None;
            if transition == Transition::Closed {
                lost_reason = "session closed".to_string();
            }
            status.set(ConnectionStatus::Disconnected);
            sink.deliver(
                id,
                SessionEvent::Disconnected {
                    reason: std::mem::take(&mut lost_reason),
                },
            );
        }

        if next == SessionState::Idle {
            if options.reconnect {
                warn!(
                    session = %id,
                    attempts = options.max_reconnect_attempts,
                    "Reconnect attempts exhausted, giving up"
                );
            } else {
                info!(session = %id, "Reconnection disabled, session ended");
            }
        }

        state = next;
    }

    // Release the connection before announcing the final state.
    drop(connection);
    state_tx.send_replace(state);
}
