//! Geographic primitives: validated coordinates, bounding boxes and the
//! coverage footprint a climate source declares for itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinateError {
    #[error("latitude {0} out of range -90..=90")]
    Latitude(f64),

    #[error("longitude {0} out of range -180..=180")]
    Longitude(f64),
}

/// A geographical point in decimal degrees.
///
/// Construct via [`Coordinate::new`], which enforces the valid ranges
/// (-90..=90 for latitude, -180..=180 for longitude).
///
/// # Examples
///
/// ```
/// use climafusion::Coordinate;
///
/// let nyc = Coordinate::new(40.71, -74.00).unwrap();
/// assert_eq!(nyc.lat, 40.71);
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Latitude and longitude scaled to integers at `decimals` precision.
    ///
    /// Cache keys use this so that `40.710001` and `40.71` collide on the
    /// same entry regardless of floating-point formatting.
    pub fn scaled(&self, decimals: u32) -> (i64, i64) {
        let factor = 10f64.powi(decimals as i32);
        (
            (self.lat * factor).round() as i64,
            (self.lon * factor).round() as i64,
        )
    }
}

/// An axis-aligned geographic bounding box, `(west, south, east, north)`
/// in decimal degrees, the same layout the upstream service registries use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.west <= coordinate.lon
            && coordinate.lon <= self.east
            && self.south <= coordinate.lat
            && coordinate.lat <= self.north
    }
}

/// The geographic footprint of a source or a validation region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// The whole globe; every coordinate is covered.
    Global,
    /// Only coordinates inside the bounding box are covered.
    Bounded(BoundingBox),
}

impl Coverage {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        match self {
            Coverage::Global => true,
            Coverage::Bounded(bbox) => bbox.contains(coordinate),
        }
    }
}
