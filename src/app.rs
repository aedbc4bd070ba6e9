//! Dashboard application state.
//!
//! The dashboard is one consumer of the client's snapshot. It keeps its own
//! copy of the last snapshot it saw, refreshed once per frame, and its only
//! control over the session is connect/disconnect.

use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::client::TelemetryClient;
use crate::gate::GateStats;
use crate::session::SessionState;
use crate::store::Snapshot;
use crate::ui::Theme;

/// How long a status message stays in the status bar.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    client: TelemetryClient,
    runtime: Handle,
    updates: watch::Receiver<Snapshot>,

    pub snapshot: Snapshot,
    pub stats: GateStats,
    pub session_state: SessionState,
    /// When the displayed reading last changed.
    pub last_update: Option<Instant>,

    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create the app around a client. `runtime` runs the client's session.
    pub fn new(client: TelemetryClient, runtime: Handle, theme: Theme) -> Self {
        let updates = client.watch();
        let snapshot = client.read();

        Self {
            running: true,
            show_help: false,
            stats: client.stats(),
            session_state: client.session_state(),
            client,
            runtime,
            updates,
            snapshot,
            last_update: None,
            theme,
            status_message: None,
        }
    }

    /// Pull the latest snapshot and counters from the client.
    ///
    /// Returns true if the snapshot changed since the last refresh.
    pub fn refresh(&mut self) -> bool {
        self.stats = self.client.stats();
        self.session_state = self.client.session_state();

        if !self.updates.has_changed().unwrap_or(false) {
            return false;
        }

        let snapshot = self.updates.borrow_and_update().clone();
        if snapshot.latest_reading() != self.snapshot.latest_reading() {
            self.last_update = Some(Instant::now());
        }
        self.snapshot = snapshot;
        true
    }

    /// Connect if idle, disconnect otherwise.
    pub fn toggle_connection(&mut self) {
        if self.client.is_running() {
            self.disconnect();
        } else {
            self.connect();
        }
    }

    pub fn connect(&mut self) {
        let runtime = self.runtime.clone();
        let _guard = runtime.enter();
        match self.client.start() {
            Ok(Some(id)) => {
                self.set_status_message(format!(
                    "Connecting to {} (session {})",
                    self.client.config().endpoint,
                    id
                ));
            }
            Ok(None) => self.set_status_message("Already connected".to_string()),
            Err(e) => self.set_status_message(format!("Cannot connect: {}", e)),
        }
        self.refresh();
    }

    pub fn disconnect(&mut self) {
        self.runtime.block_on(self.client.stop());
        self.refresh();
        self.last_update = None;
        self.set_status_message("Disconnected".to_string());
    }

    pub fn endpoint(&self) -> &str {
        &self.client.config().endpoint
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Stop the client before the app goes away.
    pub fn shutdown(&mut self) {
        self.runtime.block_on(self.client.stop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::payload;
    use crate::transport::ChannelConnector;
    use plantwatch_types::ChannelId;

    fn app(runtime: &tokio::runtime::Runtime) -> (ChannelConnector, App) {
        let connector = ChannelConnector::new();
        let config = ClientConfig {
            endpoint: "gateway:5000".to_string(),
            min_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        let client = TelemetryClient::new(config, connector.clone());
        let app = App::new(client, runtime.handle().clone(), Theme::dark());
        (connector, app)
    }

    fn wait_for(app: &mut App, check: impl Fn(&App) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            app.refresh();
            if check(app) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_toggle_connection() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (connector, mut app) = app(&runtime);
        let feed = connector.accept_next();

        app.toggle_connection();
        assert!(app.get_status_message().unwrap().starts_with("Connecting"));
        wait_for(&mut app, |app| app.snapshot.is_connected());

        feed.send_json(payload("t1", 4.3));
        wait_for(&mut app, |app| {
            app.snapshot.latest_reading().value(ChannelId::ReservoirTurbidity) == Some(4.3)
        });
        assert!(app.last_update.is_some());
        assert_eq!(app.stats.accepted, 1);

        app.toggle_connection();
        assert!(!app.snapshot.is_connected());
        assert!(app.last_update.is_none());
        assert_eq!(app.get_status_message(), Some("Disconnected"));
    }

    #[test]
    fn test_refresh_without_changes() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_, mut app) = app(&runtime);
        assert!(!app.refresh());
        assert_eq!(app.session_state, SessionState::Idle);
    }

    #[test]
    fn test_help_and_quit() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_, mut app) = app(&runtime);

        app.toggle_help();
        assert!(app.show_help);
        app.quit();
        assert!(!app.running);
    }

    #[test]
    fn test_status_message_expires() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_, mut app) = app(&runtime);

        app.status_message = Some(("old".to_string(), Instant::now() - Duration::from_secs(10)));
        assert_eq!(app.get_status_message(), None);
    }
}
