//! Message gate: decides which inbound messages reach the snapshot.
//!
//! Each message is first decoded and checked for completeness, then
//! sampled against a minimum inter-update interval. The design is
//! last-value-wins with sampling: a message that arrives inside the
//! throttle window is dropped, never queued or merged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plantwatch_types::{TelemetryReading, WireReading};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::DataFormatError;
use crate::session::{EventSink, SessionEvent, SessionId};
use crate::store::ReadingWriter;
use crate::transport::Inbound;

/// Time of the last accepted message, and the window it opens.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// Whether a message arriving at `now` is outside the window.
    pub fn admits(&self, now: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Admit and record `now` if the window allows it.
    pub fn try_admit(&mut self, now: Instant) -> bool {
        if self.admits(now) {
            self.last_accepted = Some(now);
            true
        } else {
            false
        }
    }

    /// Forget the last accepted time so the next message is admitted.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

/// Shared counters describing what the gate did with inbound messages.
#[derive(Debug, Default)]
pub struct GateCounters {
    accepted: AtomicU64,
    throttled: AtomicU64,
    malformed: AtomicU64,
    dropped_offline: AtomicU64,
}

impl GateCounters {
    pub fn stats(&self) -> GateStats {
        GateStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            dropped_offline: self.dropped_offline.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GateCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateStats {
    /// Messages that replaced the snapshot reading.
    pub accepted: u64,
    /// Well-formed messages dropped inside the throttle window.
    pub throttled: u64,
    /// Messages dropped as a [`DataFormatError`].
    pub malformed: u64,
    /// Messages that arrived while no connection was established.
    pub dropped_offline: u64,
}

/// What the gate did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Throttled,
    Malformed,
    Offline,
}

/// Decode an inbound payload into a complete reading.
pub fn decode(inbound: &Inbound) -> Result<TelemetryReading, DataFormatError> {
    match inbound {
        Inbound::Undecodable(reason) => Err(DataFormatError::Undecodable(reason.clone())),
        Inbound::Json(value) => {
            let wire = WireReading::deserialize(value)?;
            Ok(TelemetryReading::try_from(wire)?)
        }
    }
}

/// Filters inbound messages into the snapshot store.
///
/// The gate is the session's [`EventSink`]: it resets the throttle on
/// every new connection, stops accepting on disconnect, and writes
/// accepted readings through its [`ReadingWriter`].
#[derive(Debug)]
pub struct MessageGate {
    throttle: Throttle,
    writer: ReadingWriter,
    counters: Arc<GateCounters>,
    live: bool,
}

impl MessageGate {
    pub fn new(min_interval: Duration, writer: ReadingWriter, counters: Arc<GateCounters>) -> Self {
        Self {
            throttle: Throttle::new(min_interval),
            writer,
            counters,
            live: false,
        }
    }

    pub fn on_connected(&mut self) {
        self.throttle.reset();
        self.live = true;
    }

    pub fn on_disconnected(&mut self) {
        self.live = false;
    }

    /// Decide on one message arriving at `now`.
    pub fn offer(&mut self, inbound: &Inbound, now: Instant) -> Verdict {
        if !self.live {
            self.counters.dropped_offline.fetch_add(1, Ordering::Relaxed);
            debug!("Dropping message received while disconnected");
            return Verdict::Offline;
        }

        let reading = match decode(inbound) {
            Ok(reading) => reading,
            Err(e) => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Dropping malformed telemetry message");
                return Verdict::Malformed;
            }
        };

        if !self.throttle.try_admit(now) {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
            debug!(timestamp = reading.timestamp(), "Throttled telemetry message");
            return Verdict::Throttled;
        }

        let timestamp = reading.timestamp().to_string();
        if !self.writer.replace(reading) {
            // The session lost the store between connect and now.
            self.live = false;
            self.counters.dropped_offline.fetch_add(1, Ordering::Relaxed);
            return Verdict::Offline;
        }

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        debug!(timestamp = %timestamp, "Accepted telemetry reading");
        Verdict::Accepted
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }
}

impl EventSink for MessageGate {
    fn deliver(&mut self, _session: SessionId, event: SessionEvent) {
        match event {
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::Disconnected { .. } => self.on_disconnected(),
            SessionEvent::Message(inbound) => {
                self.offer(&inbound, Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotStore;
    use crate::testing::{payload, payload_without, reading};
    use plantwatch_types::ChannelId;

    fn gate(min_interval: Duration) -> (MessageGate, SnapshotStore, Arc<GateCounters>) {
        let store = SnapshotStore::new(TelemetryReading::baseline());
        let (_, writer) = store.claim(SessionId::new(1));
        let counters = Arc::new(GateCounters::default());
        let gate = MessageGate::new(min_interval, writer, counters.clone());
        (gate, store, counters)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_throttle_window() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(secs(10));

        assert!(throttle.try_admit(t0));
        assert!(!throttle.try_admit(t0 + secs(9)));
        assert!(throttle.try_admit(t0 + secs(10)));
        assert_eq!(throttle.last_accepted(), Some(t0 + secs(10)));

        throttle.reset();
        assert!(throttle.try_admit(t0 + secs(11)));
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        assert!(throttle.try_admit(t0));
        assert!(throttle.try_admit(t0));
    }

    #[test]
    fn test_greedy_sampling() {
        let (mut gate, store, counters) = gate(secs(10));
        gate.on_connected();
        let t0 = Instant::now();

        let arrivals = [0, 3, 10, 11, 25, 26, 34];
        let verdicts: Vec<Verdict> = arrivals
            .iter()
            .map(|&t| {
                let frame = Inbound::Json(payload(&format!("t{}", t), t as f64));
                gate.offer(&frame, t0 + secs(t))
            })
            .collect();

        use Verdict::*;
        assert_eq!(
            verdicts,
            vec![Accepted, Throttled, Accepted, Throttled, Accepted, Throttled, Throttled]
        );
        assert_eq!(store.read().latest_reading().timestamp(), "t25");

        let stats = counters.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.throttled, 4);
    }

    #[test]
    fn test_reconnect_clears_window() {
        let (mut gate, store, _) = gate(secs(60));
        let t0 = Instant::now();

        gate.on_connected();
        assert_eq!(gate.offer(&Inbound::Json(payload("before", 1.0)), t0), Verdict::Accepted);

        gate.on_disconnected();
        gate.on_connected();
        let verdict = gate.offer(&Inbound::Json(payload("after", 2.0)), t0 + secs(5));

        assert_eq!(verdict, Verdict::Accepted);
        assert_eq!(store.read().latest_reading().timestamp(), "after");
    }

    #[test]
    fn test_malformed_payload_leaves_snapshot_untouched() {
        let (mut gate, store, counters) = gate(secs(10));
        gate.on_connected();
        let t0 = Instant::now();

        gate.offer(&Inbound::Json(payload("good", 4.3)), t0);
        let before = store.read();

        let broken = Inbound::Json(payload_without("broken", ChannelId::ReservoirPh));
        assert_eq!(gate.offer(&broken, t0 + secs(30)), Verdict::Malformed);

        assert_eq!(store.read(), before);
        assert_eq!(counters.stats().malformed, 1);

        // The malformed message did not consume the window
        let next = Inbound::Json(payload("next", 5.0));
        assert_eq!(gate.offer(&next, t0 + secs(31)), Verdict::Accepted);
    }

    #[test]
    fn test_malformed_shapes() {
        let (mut gate, _, counters) = gate(Duration::ZERO);
        gate.on_connected();
        let now = Instant::now();

        let mut wrong_type = payload("t", 1.0);
        wrong_type["offtake"]["reservoir_ph_1"]["value"] = serde_json::json!("7.2");
        let mut no_timestamp = payload("t", 1.0);
        no_timestamp.as_object_mut().unwrap().remove("timestamp");

        let frames = [
            Inbound::Undecodable("expected value at line 1".to_string()),
            Inbound::Json(serde_json::json!(null)),
            Inbound::Json(serde_json::json!({ "timestamp": "t" })),
            Inbound::Json(wrong_type),
            Inbound::Json(no_timestamp),
        ];
        for frame in &frames {
            assert_eq!(gate.offer(frame, now), Verdict::Malformed, "{:?}", frame);
        }
        assert_eq!(counters.stats().malformed, frames.len() as u64);
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let (mut gate, store, _) = gate(secs(10));
        gate.on_connected();

        let values: [f64; 6] = [0.1 + 0.2, 4016.091, 1e-7, -3.5, 267.882, 7.701];
        let mut offtake = serde_json::Map::new();
        for (i, id) in ChannelId::ALL.into_iter().enumerate() {
            offtake.insert(
                id.wire_name().to_string(),
                serde_json::json!({ "value": values[i % values.len()], "unit": format!("u{}", i) }),
            );
        }
        let frame = Inbound::Json(serde_json::json!({ "timestamp": "rt", "offtake": offtake }));

        assert_eq!(gate.offer(&frame, Instant::now()), Verdict::Accepted);

        let snapshot = store.read();
        let latest = snapshot.latest_reading();
        assert_eq!(latest.len(), ChannelId::ALL.len());
        for (i, id) in ChannelId::ALL.into_iter().enumerate() {
            let m = latest.get(id).unwrap();
            assert_eq!(m.value.to_bits(), values[i % values.len()].to_bits());
            assert_eq!(m.unit, format!("u{}", i));
        }
    }

    #[test]
    fn test_message_while_offline_is_dropped() {
        let (mut gate, store, counters) = gate(Duration::ZERO);
        let now = Instant::now();

        // Never connected
        assert_eq!(gate.offer(&Inbound::Json(payload("t0", 1.0)), now), Verdict::Offline);

        gate.on_connected();
        gate.on_disconnected();
        assert_eq!(gate.offer(&Inbound::Json(payload("t1", 2.0)), now), Verdict::Offline);

        assert_eq!(store.read().latest_reading(), &TelemetryReading::baseline());
        assert_eq!(counters.stats().dropped_offline, 2);
    }

    #[test]
    fn test_released_writer_drops_message() {
        let (mut gate, store, counters) = gate(Duration::ZERO);
        gate.on_connected();
        store.release(SessionId::new(1));

        let verdict = gate.offer(&Inbound::Json(payload("late", 1.0)), Instant::now());
        assert_eq!(verdict, Verdict::Offline);
        assert_eq!(counters.stats().accepted, 0);
        assert_eq!(store.read().latest_reading(), &TelemetryReading::baseline());
    }

    #[test]
    fn test_decode() {
        let decoded = decode(&Inbound::Json(payload("t9", 4.3))).unwrap();
        assert_eq!(decoded, reading("t9", 4.3));

        let err = decode(&Inbound::Json(payload_without("t", ChannelId::BrigifPressure)));
        assert!(matches!(err, Err(DataFormatError::Incomplete(_))));
    }
}
