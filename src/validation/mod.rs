//! Physical-plausibility validation.
//!
//! The validator is a pure flagging function over a [`SourceSeries`]: values
//! outside the applicable bounds are flagged OUT_OF_RANGE but keep their
//! number for diagnostics. It never errors; anomalies surface as flags and
//! a warning counter in the log.

pub mod ranges;

use crate::types::observation::{Flag, SourceSeries};
use crate::validation::ranges::RangeTable;
use log::{debug, warn};

pub struct Validator {
    table: RangeTable,
}

impl Validator {
    pub fn new(table: RangeTable) -> Self {
        Self { table }
    }

    /// Validator over the built-in two-tier bounds table.
    pub fn with_defaults() -> Self {
        Self::new(RangeTable::default())
    }

    pub fn table(&self) -> &RangeTable {
        &self.table
    }

    /// Re-flags every observation in `series` against the bounds for its
    /// coordinate. Idempotent: running it twice yields the same flags, and
    /// numeric values are never touched. Variables the table has no bounds
    /// for pass through unevaluated.
    pub fn validate(&self, mut series: SourceSeries) -> SourceSeries {
        let coordinate = series.coordinate;
        let source = series.source.clone();
        let mut flagged = 0usize;

        for (variable, column) in series.values.iter_mut() {
            let Some(bounds) = self.table.lookup(&coordinate, *variable) else {
                continue;
            };
            for obs in column.iter_mut() {
                if let Some(value) = obs.value {
                    if bounds.admits(value) {
                        obs.flag = Flag::Valid;
                    } else {
                        if obs.flag != Flag::OutOfRange {
                            flagged += 1;
                        }
                        obs.flag = Flag::OutOfRange;
                    }
                }
            }
        }

        if flagged > 0 {
            warn!(
                "{source}: {flagged} observation(s) outside physical bounds at ({}, {}), flagged out-of-range",
                coordinate.lat, coordinate.lon
            );
        } else {
            debug!("{source}: all observations within physical bounds");
        }
        series
    }
}
