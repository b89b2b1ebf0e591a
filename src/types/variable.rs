//! The canonical climate variable set and units.
//!
//! Every source client normalizes its upstream field names and units into
//! these variables before anything downstream sees the data. Downstream
//! consumers (the reference-evapotranspiration formula) read values by
//! canonical name only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A daily climate variable in its canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateVariable {
    /// Daily maximum 2 m air temperature, °C.
    TempMax,
    /// Daily minimum 2 m air temperature, °C.
    TempMin,
    /// Daily mean 2 m air temperature, °C.
    TempMean,
    /// Daily mean 2 m relative humidity, %.
    RelHumidityMean,
    /// Daily mean wind speed, m/s.
    WindSpeedMean,
    /// Daily precipitation sum, mm/day.
    Precipitation,
    /// Daily shortwave radiation sum, MJ/m²/day.
    SolarRadiation,
    /// Daily mean sea-level pressure, hPa.
    Pressure,
}

impl ClimateVariable {
    pub const ALL: [ClimateVariable; 8] = [
        ClimateVariable::TempMax,
        ClimateVariable::TempMin,
        ClimateVariable::TempMean,
        ClimateVariable::RelHumidityMean,
        ClimateVariable::WindSpeedMean,
        ClimateVariable::Precipitation,
        ClimateVariable::SolarRadiation,
        ClimateVariable::Pressure,
    ];

    /// The canonical variable name, shared with the standardized schema the
    /// upstream adapters map into.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ClimateVariable::TempMax => "temperature_2m_max",
            ClimateVariable::TempMin => "temperature_2m_min",
            ClimateVariable::TempMean => "temperature_2m_mean",
            ClimateVariable::RelHumidityMean => "relative_humidity_2m_mean",
            ClimateVariable::WindSpeedMean => "wind_speed_2m_mean",
            ClimateVariable::Precipitation => "precipitation_sum",
            ClimateVariable::SolarRadiation => "shortwave_radiation_sum",
            ClimateVariable::Pressure => "pressure_mean_sea_level",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ClimateVariable::TempMax | ClimateVariable::TempMin | ClimateVariable::TempMean => {
                "°C"
            }
            ClimateVariable::RelHumidityMean => "%",
            ClimateVariable::WindSpeedMean => "m/s",
            ClimateVariable::Precipitation => "mm/day",
            ClimateVariable::SolarRadiation => "MJ/m²/day",
            ClimateVariable::Pressure => "hPa",
        }
    }

    /// The full canonical variable set.
    pub fn all_set() -> BTreeSet<ClimateVariable> {
        Self::ALL.iter().copied().collect()
    }
}

impl fmt::Display for ClimateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_are_unique() {
        let names: BTreeSet<_> = ClimateVariable::ALL
            .iter()
            .map(|v| v.canonical_name())
            .collect();
        assert_eq!(names.len(), ClimateVariable::ALL.len());
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let json = serde_json::to_string(&ClimateVariable::TempMax).unwrap();
        assert_eq!(json, "\"temp_max\"");
    }
}
