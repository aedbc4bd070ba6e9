//! # plantwatch
//!
//! A live telemetry client and terminal dashboard for water-treatment plant
//! gateways.
//!
//! The gateway publishes a continuous stream of sensor readings (reservoir
//! level, turbidity, pH, chlorine, temperature, per-site flow, cumulative
//! volume and pressure). This crate keeps a local snapshot of the current
//! plant state in sync with that stream while staying responsive under
//! intermittent connectivity.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐  events   ┌──────────────┐  readings  ┌───────────────┐
//! │ TransportSession  │──────────▶│ MessageGate  │───────────▶│ SnapshotStore │
//! │ (connect/retry)   │           │ (validate +  │            │ (read/        │
//! │                   │──────────────────────────────────────▶│  subscribe)   │
//! └─────────▲─────────┘  status   └──────────────┘            └───────┬───────┘
//!           │ start/stop                                              │ read
//!           └──────────────────────── consumers ◀─────────────────────┘
//! ```
//!
//! - **[`session`]**: one logical connection to the gateway with a fixed-delay
//!   reconnect policy, driven by an explicit state machine
//! - **[`gate`]**: decodes each inbound message, rejects malformed ones, and
//!   samples the rest against a minimum inter-update interval
//! - **[`store`]**: the snapshot (latest reading plus connection status) with
//!   read, watch and subscribe access for consumers
//! - **[`client`]**: [`TelemetryClient`] wires the three together
//! - **[`transport`]**: the [`Connector`] seam, with a TCP implementation and
//!   an in-memory one
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Dashboard against a gateway
//! plantwatch --connect gateway.plant.local:5000
//!
//! # Log every snapshot change instead of drawing a dashboard
//! plantwatch --config plantwatch.toml --headless
//! ```
//!
//! ### As a library
//!
//! ```
//! use plantwatch::{ChannelConnector, ClientConfig, TelemetryClient};
//! use plantwatch_types::ConnectionStatus;
//!
//! let config = ClientConfig::default();
//! let client = TelemetryClient::new(config, ChannelConnector::new());
//!
//! let snapshot = client.read();
//! assert_eq!(snapshot.connection_status(), ConnectionStatus::Disconnected);
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod duration;
pub mod error;
pub mod events;
pub mod gate;
pub mod session;
pub mod store;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use app::App;
pub use client::TelemetryClient;
pub use config::{ClientConfig, FileConfig};
pub use error::{ConfigurationError, ConnectionError, DataFormatError};
pub use gate::{GateStats, MessageGate, Throttle};
pub use session::{
    EventSink, SessionEvent, SessionId, SessionOptions, SessionState, TransportSession,
};
pub use store::{ReadingWriter, Snapshot, SnapshotStore, StatusWriter, Subscription};
pub use transport::{
    ChannelConnector, Connection, ConnectionFeed, Connector, Endpoint, Inbound, TcpConnector,
};
