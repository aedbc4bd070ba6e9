//! Snapshot store: the single source of truth for what consumers display.
//!
//! The store holds the latest accepted [`TelemetryReading`] and the
//! gateway [`ConnectionStatus`]. Consumers get read access through a cheap
//! [`SnapshotStore`] handle. Writes go through two capabilities handed out
//! to the session that currently owns the store:
//!
//! - [`StatusWriter`] for the transport session's connect/disconnect events
//! - [`ReadingWriter`] for readings accepted by the message gate
//!
//! A writer whose session no longer owns the store is inert.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use plantwatch_types::{ConnectionStatus, TelemetryReading};
use tokio::sync::watch;

use crate::session::SessionId;

/// The locally held view of plant state.
///
/// Snapshots are immutable values; cloning one is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    reading: Arc<TelemetryReading>,
    status: ConnectionStatus,
}

impl Snapshot {
    /// The most recent accepted reading (or the default one).
    pub fn latest_reading(&self) -> &TelemetryReading {
        &self.reading
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct Shared {
    default_reading: Arc<TelemetryReading>,
    tx: watch::Sender<Snapshot>,
    owner: Mutex<Option<SessionId>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

impl Shared {
    /// Apply `update` if `session` owns the store. Listeners run after the
    /// ownership lock is released so they may call back into the store.
    fn write(&self, session: SessionId, update: impl FnOnce(&mut Snapshot) -> bool) -> bool {
        let changed = {
            let owner = self.owner.lock();
            if *owner != Some(session) {
                return false;
            }
            self.tx.send_if_modified(update)
        };

        if changed {
            self.notify();
        }
        true
    }

    fn notify(&self) {
        let snapshot = self.tx.borrow().clone();
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Read handle for the snapshot store.
///
/// Cloning the handle shares the same underlying store.
///
/// # Example
///
/// ```
/// use plantwatch::SnapshotStore;
/// use plantwatch_types::{ConnectionStatus, TelemetryReading};
///
/// let store = SnapshotStore::new(TelemetryReading::baseline());
/// let snapshot = store.read();
/// assert_eq!(snapshot.connection_status(), ConnectionStatus::Disconnected);
///
/// let subscription = store.subscribe(|snapshot| {
///     println!("status is now {}", snapshot.connection_status());
/// });
/// subscription.unsubscribe();
/// ```
#[derive(Clone)]
pub struct SnapshotStore {
    shared: Arc<Shared>,
}

impl SnapshotStore {
    /// Create a store holding `default_reading` and `disconnected`.
    pub fn new(default_reading: TelemetryReading) -> Self {
        let default_reading = Arc::new(default_reading);
        let (tx, _) = watch::channel(Snapshot {
            reading: default_reading.clone(),
            status: ConnectionStatus::Disconnected,
        });

        Self {
            shared: Arc::new(Shared {
                default_reading,
                tx,
                owner: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// The current snapshot. Never blocks on the writer.
    pub fn read(&self) -> Snapshot {
        self.shared.tx.borrow().clone()
    }

    /// A watch receiver for async consumers.
    ///
    /// Rapid successive changes may be observed as one; use
    /// [`subscribe`](Self::subscribe) to see every change.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.shared.tx.subscribe()
    }

    /// Register a listener called with the new snapshot on every change.
    ///
    /// The listener runs on the writer's task and should return quickly.
    /// It stays registered until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.lock().push((id, Arc::new(listener)));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    /// Hand ownership to `session` and return its two writers.
    ///
    /// Writers from any previous owner stop working immediately.
    pub(crate) fn claim(&self, session: SessionId) -> (StatusWriter, ReadingWriter) {
        *self.shared.owner.lock() = Some(session);

        (
            StatusWriter {
                session,
                shared: self.shared.clone(),
            },
            ReadingWriter {
                session,
                shared: self.shared.clone(),
            },
        )
    }

    /// Tear down the snapshot left by `session` and take ownership away.
    ///
    /// Restores the default reading and `disconnected` if `session` still
    /// owns the store. A superseded session's release leaves the store alone.
    /// Once this returns, no write from `session` can land.
    pub(crate) fn release(&self, session: SessionId) {
        let changed = {
            let mut owner = self.shared.owner.lock();
            if *owner != Some(session) {
                return;
            }
            *owner = None;
            self.restore_default()
        };

        if changed {
            self.shared.notify();
        }
    }

    /// Restore the default reading and `disconnected`.
    pub(crate) fn reset(&self) {
        if self.restore_default() {
            self.shared.notify();
        }
    }

    fn restore_default(&self) -> bool {
        let default_reading = self.shared.default_reading.clone();
        self.shared.tx.send_if_modified(|snapshot| {
            let reset = Snapshot {
                reading: default_reading,
                status: ConnectionStatus::Disconnected,
            };
            let changed = *snapshot != reset;
            *snapshot = reset;
            changed
        })
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("snapshot", &*self.shared.tx.borrow())
            .field("owner", &*self.shared.owner.lock())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Writes the connection status on behalf of one session.
pub struct StatusWriter {
    session: SessionId,
    shared: Arc<Shared>,
}

impl StatusWriter {
    /// Set the status. Returns `false` if the session no longer owns the store.
    pub fn set(&self, status: ConnectionStatus) -> bool {
        self.shared.write(self.session, |snapshot| {
            let changed = snapshot.status != status;
            snapshot.status = status;
            changed
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl std::fmt::Debug for StatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusWriter")
            .field("session", &self.session)
            .finish()
    }
}

/// Replaces the latest reading on behalf of one session.
pub struct ReadingWriter {
    session: SessionId,
    shared: Arc<Shared>,
}

impl ReadingWriter {
    /// Replace the whole reading. Returns `false` if the session no longer
    /// owns the store.
    pub fn replace(&self, reading: TelemetryReading) -> bool {
        let reading = Arc::new(reading);
        self.shared.write(self.session, |snapshot| {
            snapshot.reading = reading;
            true
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl std::fmt::Debug for ReadingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingWriter")
            .field("session", &self.session)
            .finish()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Remove the listener. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
