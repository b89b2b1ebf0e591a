//! The per-variable, per-region physical bounds table.
//!
//! Two tiers: a broad global set admitting physically extreme but real
//! values (world-record territory), and tighter literature-derived sets for
//! specific regions. Regions are an ordered list evaluated top-to-bottom;
//! the first region that contains the coordinate and carries bounds for the
//! variable wins, with the global set as the mandatory final fallback.
//! The regional numbers follow the Xavier et al. gridded-dataset limits the
//! original validation stage used (temperature strictly inside -30..50 °C,
//! precipitation below 450 mm/day, wind below 100 m/s).

use crate::types::coordinate::{BoundingBox, Coordinate, Coverage};
use crate::types::variable::ClimateVariable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which endpoints of a bound interval are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoints {
    Both,
    Left,
    Right,
    Neither,
}

/// The admissible interval for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableBounds {
    pub min: f64,
    pub max: f64,
    pub endpoints: Endpoints,
}

impl VariableBounds {
    pub const fn new(min: f64, max: f64, endpoints: Endpoints) -> Self {
        Self {
            min,
            max,
            endpoints,
        }
    }

    pub fn admits(&self, value: f64) -> bool {
        let above_min = match self.endpoints {
            Endpoints::Both | Endpoints::Left => value >= self.min,
            Endpoints::Right | Endpoints::Neither => value > self.min,
        };
        let below_max = match self.endpoints {
            Endpoints::Both | Endpoints::Right => value <= self.max,
            Endpoints::Left | Endpoints::Neither => value < self.max,
        };
        above_min && below_max
    }
}

/// One regional tier: a geometry test plus the bounds that apply inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub name: String,
    pub geometry: Coverage,
    pub bounds: BTreeMap<ClimateVariable, VariableBounds>,
}

/// The full two-tier bounds table. Externally supplied static configuration;
/// [`RangeTable::default`] ships the built-in tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTable {
    pub regions: Vec<RegionBounds>,
    pub global: BTreeMap<ClimateVariable, VariableBounds>,
}

impl RangeTable {
    /// Finds the bounds applying to `variable` at `coordinate`: first
    /// matching region wins, global is the fallback. `None` means the
    /// variable is not bounded anywhere and is never flagged.
    pub fn lookup(
        &self,
        coordinate: &Coordinate,
        variable: ClimateVariable,
    ) -> Option<&VariableBounds> {
        for region in &self.regions {
            if region.geometry.contains(coordinate) {
                if let Some(bounds) = region.bounds.get(&variable) {
                    return Some(bounds);
                }
            }
        }
        self.global.get(&variable)
    }
}

fn literature_bounds() -> BTreeMap<ClimateVariable, VariableBounds> {
    use ClimateVariable::*;
    use Endpoints::*;
    [
        (TempMax, VariableBounds::new(-30.0, 50.0, Neither)),
        (TempMin, VariableBounds::new(-30.0, 50.0, Neither)),
        (TempMean, VariableBounds::new(-30.0, 50.0, Neither)),
        (RelHumidityMean, VariableBounds::new(0.0, 100.0, Both)),
        (WindSpeedMean, VariableBounds::new(0.0, 100.0, Left)),
        (Precipitation, VariableBounds::new(0.0, 450.0, Left)),
        (SolarRadiation, VariableBounds::new(0.0, 40.0, Left)),
        (Pressure, VariableBounds::new(900.0, 1100.0, Both)),
    ]
    .into_iter()
    .collect()
}

impl Default for RangeTable {
    /// The built-in table: world-record-wide global bounds plus
    /// literature-derived tiers for continental USA and the Brazilian
    /// gridded-dataset domain.
    fn default() -> Self {
        use ClimateVariable::*;
        use Endpoints::*;

        let global = [
            (TempMax, VariableBounds::new(-90.0, 60.0, Neither)),
            (TempMin, VariableBounds::new(-90.0, 60.0, Neither)),
            (TempMean, VariableBounds::new(-90.0, 60.0, Neither)),
            (RelHumidityMean, VariableBounds::new(0.0, 100.0, Both)),
            (WindSpeedMean, VariableBounds::new(0.0, 115.0, Left)),
            (Precipitation, VariableBounds::new(0.0, 1830.0, Left)),
            (SolarRadiation, VariableBounds::new(0.0, 45.0, Left)),
            (Pressure, VariableBounds::new(850.0, 1090.0, Both)),
        ]
        .into_iter()
        .collect();

        RangeTable {
            regions: vec![
                RegionBounds {
                    name: "conus".to_string(),
                    geometry: Coverage::Bounded(BoundingBox::new(-125.0, 24.0, -66.0, 49.0)),
                    bounds: literature_bounds(),
                },
                RegionBounds {
                    name: "brazil_gridded".to_string(),
                    geometry: Coverage::Bounded(BoundingBox::new(-74.0, -34.0, -34.0, 6.0)),
                    bounds: literature_bounds(),
                },
            ],
            global,
        }
    }
}
