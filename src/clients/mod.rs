//! Source clients: one adapter per upstream climate service, all behind the
//! uniform [`SourceClient`] interface.
//!
//! Every adapter does exactly three things: declare its static coverage
//! ([`SourceDescriptor`]), fetch the raw payload for a coordinate and date
//! range, and normalize that payload into a [`SourceSeries`] with canonical
//! variable names and units. Nothing outside this module knows any
//! upstream's schema.

pub mod error;
mod http;
pub mod met_norway;
pub mod nasa_power;
pub mod nws;
pub mod open_meteo;

use crate::clients::error::SourceError;
use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::descriptor::SourceDescriptor;
use crate::types::observation::SourceSeries;
use async_trait::async_trait;
use std::sync::Arc;

/// FAO-56 log-profile factor converting 10 m wind speed to the canonical
/// 2 m height: 4.87 / ln(67.8 * 10 - 5.42).
pub(crate) const WIND_10M_TO_2M: f64 = 0.748;

/// The uniform contract every upstream adapter satisfies.
///
/// `fetch_raw` performs the network I/O and returns the upstream's payload
/// as-is; `normalize` is pure and turns that payload into a canonical
/// series. The split lets the manager retry the network step without
/// re-normalizing, and lets tests exercise normalization on canned payloads.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Static coverage, window, variable set, priority and reliability.
    fn descriptor(&self) -> &SourceDescriptor;

    /// Fetches the raw upstream payload for one coordinate and date range.
    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<serde_json::Value, SourceError>;

    /// Normalizes a raw payload into a canonical daily series covering
    /// exactly `range`, one observation slot per day per variable.
    fn normalize(
        &self,
        raw: &serde_json::Value,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<SourceSeries, SourceError>;
}

/// The default upstream set, mirroring the configured source registry:
/// two Open-Meteo endpoints, NASA POWER, MET Norway and the USA-only NWS
/// forecast grid.
pub fn default_clients() -> Vec<Arc<dyn SourceClient>> {
    vec![
        Arc::new(open_meteo::OpenMeteoArchive::new()),
        Arc::new(open_meteo::OpenMeteoForecast::new()),
        Arc::new(nasa_power::NasaPower::new()),
        Arc::new(met_norway::MetNorway::new()),
        Arc::new(nws::NwsForecast::new()),
    ]
}
