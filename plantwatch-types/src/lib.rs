//! # plantwatch-types
//!
//! Core types for water-treatment plant telemetry. This crate defines the
//! data model shared between the plantwatch client and anything that reads
//! its snapshots: the fixed set of sensor channels, a single measurement,
//! a complete telemetry reading, and the gateway connection status.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` for the gateway's JSON wire shape
//! - **Closed channel set**: Every channel is known at build time, so a reading
//!   is either complete or rejected
//! - **Immutable readings**: A [`TelemetryReading`] can only be built, never edited
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: Serialization of readings in the gateway's wire shape
//!
//! ## Example
//!
//! ```rust
//! use plantwatch_types::{ChannelId, TelemetryReading};
//!
//! let mut builder = TelemetryReading::builder("2025-11-05 09:46:46");
//! for id in ChannelId::ALL {
//!     builder = builder.channel(id, 1.0, id.default_unit());
//! }
//! let reading = builder.build().unwrap();
//!
//! assert_eq!(reading.value(ChannelId::ReservoirPh), Some(1.0));
//! assert_eq!(reading.timestamp(), "2025-11-05 09:46:46");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod reading;
mod status;

pub use channel::*;
pub use reading::*;
pub use status::*;
