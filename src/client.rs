//! The telemetry client: session, gate and store wired together.

use std::sync::Arc;

use plantwatch_types::TelemetryReading;
use tokio::sync::watch;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ConfigurationError;
use crate::gate::{GateCounters, GateStats, MessageGate};
use crate::session::{SessionId, SessionState, TransportSession};
use crate::store::{Snapshot, SnapshotStore, Subscription};
use crate::transport::Connector;

/// Keeps a local snapshot of plant state in sync with the gateway.
///
/// Consumers only read: [`read`](Self::read), [`subscribe`](Self::subscribe)
/// or [`watch`](Self::watch). The owner drives the lifecycle with
/// [`start`](Self::start) and [`stop`](Self::stop). Dropping the client
/// closes its session without waiting for the task to finish.
///
/// # Example
///
/// ```no_run
/// use plantwatch::{ClientConfig, TelemetryClient};
///
/// # tokio_test::block_on(async {
/// let config = ClientConfig::default();
/// let connector = config.connector();
/// let mut client = TelemetryClient::new(config, connector);
///
/// let _subscription = client.subscribe(|snapshot| {
///     println!("{} at {}", snapshot.connection_status(), snapshot.latest_reading().timestamp());
/// });
///
/// client.start().unwrap();
/// tokio::time::sleep(std::time::Duration::from_secs(60)).await;
/// client.stop().await;
/// # });
/// ```
#[derive(Debug)]
pub struct TelemetryClient {
    config: ClientConfig,
    store: SnapshotStore,
    session: TransportSession,
    counters: Arc<GateCounters>,
}

impl TelemetryClient {
    /// Create a client showing [`TelemetryReading::baseline`] until live
    /// data arrives.
    pub fn new(config: ClientConfig, connector: impl Connector) -> Self {
        Self::with_default_reading(config, Arc::new(connector), TelemetryReading::baseline())
    }

    /// Create a client with a caller-supplied default reading.
    pub fn with_default_reading(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        default_reading: TelemetryReading,
    ) -> Self {
        Self {
            config,
            store: SnapshotStore::new(default_reading),
            session: TransportSession::new(connector),
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Open the session to the configured gateway.
    ///
    /// Returns the new session id, or `None` if the client was already
    /// running. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<Option<SessionId>, ConfigurationError> {
        let min_interval = self.config.min_interval;
        let counters = self.counters.clone();

        self.session.open(
            &self.config.endpoint,
            self.config.session,
            &self.store,
            move |writer| MessageGate::new(min_interval, writer, counters),
        )
    }

    /// Close the session and reset the snapshot to its default.
    ///
    /// Safe to call when not running.
    pub async fn stop(&mut self) {
        self.session.close().await;
        self.store.reset();
        info!("Telemetry client stopped");
    }

    /// The current snapshot.
    pub fn read(&self) -> Snapshot {
        self.store.read()
    }

    /// Call `listener` with the new snapshot on every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.store.watch()
    }

    /// A read handle to the snapshot store, for consumers living elsewhere.
    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    pub fn stats(&self) -> GateStats {
        self.counters.stats()
    }

    /// Whether the session is connecting, connected, or waiting to reconnect.
    pub fn is_running(&self) -> bool {
        self.session.is_open()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
