use crate::fusion::FusionError;
use crate::manager::error::ManagerError;
use crate::types::context::ContextError;
use crate::types::coordinate::CoordinateError;
use crate::types::date_range::DateRangeError;
use thiserror::Error;

/// The top-level error type every public operation returns.
#[derive(Debug, Error)]
pub enum ClimaFusionError {
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    #[error(transparent)]
    DateRange(#[from] DateRangeError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Fusion(#[from] FusionError),
}
