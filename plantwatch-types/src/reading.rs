//! TelemetryReading - one complete set of plant measurements.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::ChannelId;

/// A single sensor value together with the unit the gateway reported.
///
/// The unit is carried through verbatim; it is not normalized or checked
/// against [`ChannelId::default_unit`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

impl Measurement {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// A complete, immutable set of plant measurements.
///
/// Every channel in [`ChannelId::ALL`] is present. A reading cannot be
/// modified after construction: a newer reading replaces an older one as a
/// whole, it never patches it.
///
/// With the `serde` feature the reading serializes in the gateway's wire
/// shape:
///
/// ```json
/// {
///   "timestamp": "2025-11-05 09:46:46",
///   "offtake": {
///     "reservoir_water_level_1": { "value": 2.654, "unit": "m" },
///     "reservoir_turbidity_1": { "value": 4.326, "unit": "NTU" }
///   }
/// }
/// ```
///
/// and deserializing rejects payloads with missing channels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "WireReading"))]
pub struct TelemetryReading {
    timestamp: String,
    #[cfg_attr(feature = "serde", serde(rename = "offtake"))]
    channels: BTreeMap<ChannelId, Measurement>,
}

impl TelemetryReading {
    /// Start building a reading with the given timestamp.
    ///
    /// The timestamp is opaque; it is stored and displayed as given.
    pub fn builder(timestamp: impl Into<String>) -> ReadingBuilder {
        ReadingBuilder::new(timestamp)
    }

    /// The figures recorded at commissioning.
    ///
    /// Used as the initial display value until live data arrives.
    pub fn baseline() -> Self {
        let figures: [(ChannelId, f64, &str); 12] = [
            (ChannelId::ReservoirWaterLevel, 2.654, "m"),
            (ChannelId::ReservoirTurbidity, 4.326, "NTU"),
            (ChannelId::ReservoirPh, 7.701, "pH"),
            (ChannelId::ReservoirChlorine, 0.217, "mg/L"),
            (ChannelId::ReservoirTemperature, 27.482, "C"),
            (ChannelId::MatangBayuFlow, 267.882, "m3/h"),
            (ChannelId::MatangBayuCubic, 4016.091, "m3"),
            (ChannelId::LhoksukonFlow, 146.174, "m3/h"),
            (ChannelId::LhoksukonCubic, 2678.064, "m3"),
            (ChannelId::MatangBayuPressure, 2.789, "bar"),
            (ChannelId::LhoksukonPressure, 3.319, "bar"),
            (ChannelId::BrigifPressure, 3.361, "bar"),
        ];

        Self {
            timestamp: String::from("2025-11-05 09:46:46"),
            channels: figures
                .into_iter()
                .map(|(id, value, unit)| (id, Measurement::new(value, unit)))
                .collect(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Get the measurement for a channel.
    pub fn get(&self, id: ChannelId) -> Option<&Measurement> {
        self.channels.get(&id)
    }

    /// Shorthand for the numeric value of a channel.
    pub fn value(&self, id: ChannelId) -> Option<f64> {
        self.channels.get(&id).map(|m| m.value)
    }

    /// Iterate over all channels in [`ChannelId`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, &Measurement)> {
        self.channels.iter()
    }

    /// Number of channels (always [`ChannelId::ALL`]`.len()`).
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Builder for constructing [`TelemetryReading`] instances.
#[derive(Debug, Clone)]
pub struct ReadingBuilder {
    timestamp: String,
    channels: BTreeMap<ChannelId, Measurement>,
}

impl ReadingBuilder {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            channels: BTreeMap::new(),
        }
    }

    /// Set a channel's value and unit. A later call for the same channel wins.
    pub fn channel(mut self, id: ChannelId, value: f64, unit: impl Into<String>) -> Self {
        self.channels.insert(id, Measurement::new(value, unit));
        self
    }

    pub fn measurement(mut self, id: ChannelId, measurement: Measurement) -> Self {
        self.channels.insert(id, measurement);
        self
    }

    /// Finish the reading, failing if any channel was never set.
    pub fn build(self) -> Result<TelemetryReading, IncompleteReading> {
        let missing: Vec<ChannelId> = ChannelId::ALL
            .into_iter()
            .filter(|id| !self.channels.contains_key(id))
            .collect();

        if !missing.is_empty() {
            return Err(IncompleteReading { missing });
        }

        Ok(TelemetryReading {
            timestamp: self.timestamp,
            channels: self.channels,
        })
    }
}

/// A reading could not be built because channels were absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteReading {
    /// The absent channels, in [`ChannelId`] order.
    pub missing: Vec<ChannelId>,
}

impl fmt::Display for IncompleteReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("reading is missing channels:")?;
        for id in &self.missing {
            write!(f, " {}", id)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IncompleteReading {}

/// The gateway payload before the completeness check.
///
/// Channel keys are kept as strings so that names this build does not know
/// about are skipped instead of failing the whole payload.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WireReading {
    pub timestamp: String,
    pub offtake: BTreeMap<String, Measurement>,
}

#[cfg(feature = "serde")]
impl TryFrom<WireReading> for TelemetryReading {
    type Error = IncompleteReading;

    fn try_from(wire: WireReading) -> Result<Self, Self::Error> {
        wire.offtake
            .into_iter()
            .filter_map(|(name, m)| ChannelId::from_wire_name(&name).map(|id| (id, m)))
            .fold(ReadingBuilder::new(wire.timestamp), |b, (id, m)| {
                b.measurement(id, m)
            })
            .build()
    }
}
