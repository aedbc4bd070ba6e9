//! Fixtures shared by the unit tests.

use plantwatch_types::{ChannelId, TelemetryReading};
use serde_json::{json, Map, Value};

/// A complete reading with every channel at 1.0 except turbidity.
pub fn reading(timestamp: &str, turbidity: f64) -> TelemetryReading {
    ChannelId::ALL
        .into_iter()
        .fold(TelemetryReading::builder(timestamp), |b, id| {
            b.channel(id, 1.0, id.default_unit())
        })
        .channel(ChannelId::ReservoirTurbidity, turbidity, "NTU")
        .build()
        .unwrap()
}

/// The wire payload matching [`reading`].
pub fn payload(timestamp: &str, turbidity: f64) -> Value {
    serde_json::to_value(reading(timestamp, turbidity)).unwrap()
}

/// A wire payload with one channel left out.
pub fn payload_without(timestamp: &str, missing: ChannelId) -> Value {
    let mut offtake = Map::new();
    for id in ChannelId::ALL {
        if id != missing {
            offtake.insert(
                id.wire_name().to_string(),
                json!({ "value": 2.0, "unit": id.default_unit() }),
            );
        }
    }
    json!({ "timestamp": timestamp, "offtake": offtake })
}
