//! Multi-source acquisition, validation and fusion of daily climate series.
//!
//! `climafusion` fetches daily environmental time series (temperature,
//! humidity, wind, precipitation, radiation, pressure) from several public
//! weather services concurrently, flags physically implausible values
//! against two-tier regional/global bounds, and fuses the surviving series
//! into one best-estimate series with per-day uncertainty. The fused output
//! feeds downstream agronomic computations such as daily reference
//! evapotranspiration.
//!
//! The entry point is [`ClimaFusion`]:
//!
//! ```no_run
//! use climafusion::{ClimaFusion, ClimaFusionError, Coordinate, RequestContext};
//!
//! # async fn run() -> Result<(), ClimaFusionError> {
//! let client = ClimaFusion::new();
//! let fused = client
//!     .fetch_fused()
//!     .coordinate(Coordinate::new(40.71, -74.00)?)
//!     .context(RequestContext::Forecast)
//!     .call()
//!     .await?;
//! for day in fused.iter() {
//!     println!("{}: {:?}", day.date, day.values);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod clients;
mod climafusion;
mod error;
mod fusion;
mod manager;
mod prefetch;
mod types;
mod validation;

pub use climafusion::ClimaFusion;
pub use error::ClimaFusionError;

pub use cache::{
    ttl_for_range, CacheKey, CacheStore, MemoryCache, FORECAST_TTL, HISTORICAL_TTL, RECENT_TTL,
};
pub use clients::error::SourceError;
pub use clients::{default_clients, SourceClient};
pub use fusion::{FusionConfig, FusionEngine, FusionError};
pub use manager::error::ManagerError;
pub use manager::{FetchConfig, FetchFailure, FetchOutcome, SourceManager};
pub use prefetch::{warm, PrefetchTarget, WarmReport};
pub use validation::ranges::{Endpoints, RangeTable, RegionBounds, VariableBounds};
pub use validation::Validator;

pub use types::context::{
    ContextError, RequestContext, DASHBOARD_LENGTHS, FORECAST_HORIZON_DAYS,
    HISTORICAL_MAX_LENGTH_DAYS, HISTORICAL_MIN_AGE_DAYS,
};
pub use types::coordinate::{BoundingBox, Coordinate, CoordinateError, Coverage};
pub use types::date_range::{DateRange, DateRangeError};
pub use types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
pub use types::fused::{FusedDay, FusedSeries, FusedValue};
pub use types::observation::{
    observations_for_range, DailyObservation, Flag, SourceId, SourceSeries,
};
pub use types::variable::ClimateVariable;
