//! The fixed set of plant sensor channels.

use core::fmt;

/// Identifies one sensor channel published by the telemetry gateway.
///
/// The set is closed: the gateway publishes exactly these channels and a
/// reading missing any of them is considered malformed. With the `serde`
/// feature enabled, each variant (de)serializes as its gateway wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelId {
    #[cfg_attr(feature = "serde", serde(rename = "reservoir_water_level_1"))]
    ReservoirWaterLevel,
    #[cfg_attr(feature = "serde", serde(rename = "reservoir_turbidity_1"))]
    ReservoirTurbidity,
    #[cfg_attr(feature = "serde", serde(rename = "reservoir_ph_1"))]
    ReservoirPh,
    #[cfg_attr(feature = "serde", serde(rename = "reservoir_chlorine_1"))]
    ReservoirChlorine,
    #[cfg_attr(feature = "serde", serde(rename = "reservoir_temperature_1"))]
    ReservoirTemperature,
    #[cfg_attr(feature = "serde", serde(rename = "Matang_Bayu_Flow"))]
    MatangBayuFlow,
    #[cfg_attr(feature = "serde", serde(rename = "Matang_Bayu_Cubic"))]
    MatangBayuCubic,
    #[cfg_attr(feature = "serde", serde(rename = "Lhoksukon_Flow"))]
    LhoksukonFlow,
    #[cfg_attr(feature = "serde", serde(rename = "Lhoksukon_Cubic"))]
    LhoksukonCubic,
    #[cfg_attr(feature = "serde", serde(rename = "Matang_Bayu_Pressure"))]
    MatangBayuPressure,
    #[cfg_attr(feature = "serde", serde(rename = "Lhoksukon_Pressure"))]
    LhoksukonPressure,
    #[cfg_attr(feature = "serde", serde(rename = "Brigif_Pressure"))]
    BrigifPressure,
}

/// What physical quantity a channel measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Level,
    Turbidity,
    Ph,
    Chlorine,
    Temperature,
    /// Instantaneous flow rate.
    Flow,
    /// Cumulative delivered volume.
    Volume,
    Pressure,
}

/// Where in the plant a channel is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Site {
    Reservoir,
    MatangBayu,
    Lhoksukon,
    Brigif,
}

impl Site {
    /// Human-readable site name.
    pub fn name(&self) -> &'static str {
        match self {
            Site::Reservoir => "Reservoir",
            Site::MatangBayu => "Matang Bayu",
            Site::Lhoksukon => "Lhoksukon",
            Site::Brigif => "Brigif",
        }
    }
}

impl ChannelId {
    /// Every channel, in display order.
    pub const ALL: [ChannelId; 12] = [
        ChannelId::ReservoirWaterLevel,
        ChannelId::ReservoirTurbidity,
        ChannelId::ReservoirPh,
        ChannelId::ReservoirChlorine,
        ChannelId::ReservoirTemperature,
        ChannelId::MatangBayuFlow,
        ChannelId::MatangBayuCubic,
        ChannelId::LhoksukonFlow,
        ChannelId::LhoksukonCubic,
        ChannelId::MatangBayuPressure,
        ChannelId::LhoksukonPressure,
        ChannelId::BrigifPressure,
    ];

    /// The key the gateway uses for this channel.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ChannelId::ReservoirWaterLevel => "reservoir_water_level_1",
            ChannelId::ReservoirTurbidity => "reservoir_turbidity_1",
            ChannelId::ReservoirPh => "reservoir_ph_1",
            ChannelId::ReservoirChlorine => "reservoir_chlorine_1",
            ChannelId::ReservoirTemperature => "reservoir_temperature_1",
            ChannelId::MatangBayuFlow => "Matang_Bayu_Flow",
            ChannelId::MatangBayuCubic => "Matang_Bayu_Cubic",
            ChannelId::LhoksukonFlow => "Lhoksukon_Flow",
            ChannelId::LhoksukonCubic => "Lhoksukon_Cubic",
            ChannelId::MatangBayuPressure => "Matang_Bayu_Pressure",
            ChannelId::LhoksukonPressure => "Lhoksukon_Pressure",
            ChannelId::BrigifPressure => "Brigif_Pressure",
        }
    }

    /// Look up a channel by its wire name. Matching is exact.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.wire_name() == name)
    }

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            ChannelId::ReservoirWaterLevel => "Water Level",
            ChannelId::ReservoirTurbidity => "Turbidity",
            ChannelId::ReservoirPh => "pH",
            ChannelId::ReservoirChlorine => "Chlorine",
            ChannelId::ReservoirTemperature => "Temperature",
            ChannelId::MatangBayuFlow | ChannelId::LhoksukonFlow => "Flow",
            ChannelId::MatangBayuCubic | ChannelId::LhoksukonCubic => "Volume",
            ChannelId::MatangBayuPressure
            | ChannelId::LhoksukonPressure
            | ChannelId::BrigifPressure => "Pressure",
        }
    }

    /// The unit the gateway normally reports for this channel.
    pub fn default_unit(&self) -> &'static str {
        match self.kind() {
            ChannelKind::Level => "m",
            ChannelKind::Turbidity => "NTU",
            ChannelKind::Ph => "pH",
            ChannelKind::Chlorine => "mg/L",
            ChannelKind::Temperature => "C",
            ChannelKind::Flow => "m3/h",
            ChannelKind::Volume => "m3",
            ChannelKind::Pressure => "bar",
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelId::ReservoirWaterLevel => ChannelKind::Level,
            ChannelId::ReservoirTurbidity => ChannelKind::Turbidity,
            ChannelId::ReservoirPh => ChannelKind::Ph,
            ChannelId::ReservoirChlorine => ChannelKind::Chlorine,
            ChannelId::ReservoirTemperature => ChannelKind::Temperature,
            ChannelId::MatangBayuFlow | ChannelId::LhoksukonFlow => ChannelKind::Flow,
            ChannelId::MatangBayuCubic | ChannelId::LhoksukonCubic => ChannelKind::Volume,
            ChannelId::MatangBayuPressure
            | ChannelId::LhoksukonPressure
            | ChannelId::BrigifPressure => ChannelKind::Pressure,
        }
    }

    pub fn site(&self) -> Site {
        match self {
            ChannelId::ReservoirWaterLevel
            | ChannelId::ReservoirTurbidity
            | ChannelId::ReservoirPh
            | ChannelId::ReservoirChlorine
            | ChannelId::ReservoirTemperature => Site::Reservoir,
            ChannelId::MatangBayuFlow
            | ChannelId::MatangBayuCubic
            | ChannelId::MatangBayuPressure => Site::MatangBayu,
            ChannelId::LhoksukonFlow | ChannelId::LhoksukonCubic | ChannelId::LhoksukonPressure => {
                Site::Lhoksukon
            }
            ChannelId::BrigifPressure => Site::Brigif,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_lookup() {
        for id in ChannelId::ALL {
            assert_eq!(ChannelId::from_wire_name(id.wire_name()), Some(id));
        }
        assert_eq!(ChannelId::from_wire_name("reservoir_ph_2"), None);
        assert_eq!(ChannelId::from_wire_name("RESERVOIR_PH_1"), None);
    }

    #[test]
    fn test_sites() {
        let brigif: Vec<_> = ChannelId::ALL
            .into_iter()
            .filter(|id| id.site() == Site::Brigif)
            .collect();
        assert_eq!(brigif, vec![ChannelId::BrigifPressure]);

        let reservoir = ChannelId::ALL
            .into_iter()
            .filter(|id| id.site() == Site::Reservoir)
            .count();
        assert_eq!(reservoir, 5);
    }

    #[test]
    fn test_default_units() {
        assert_eq!(ChannelId::ReservoirTurbidity.default_unit(), "NTU");
        assert_eq!(ChannelId::LhoksukonFlow.default_unit(), "m3/h");
        assert_eq!(ChannelId::BrigifPressure.default_unit(), "bar");
    }
}
