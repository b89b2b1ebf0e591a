//! The fused output: one best-estimate series with per-day uncertainty.

use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::observation::{Flag, SourceId};
use crate::types::variable::ClimateVariable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fused estimate for one variable on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedValue {
    /// The fused value in the variable's canonical unit, or `None` when no
    /// source had a usable observation for this date.
    pub value: Option<f64>,
    /// Estimated variance of the fused value; smaller means more sources
    /// agreed or a more reliable source contributed.
    pub variance: Option<f64>,
    /// How many sources contributed a VALID observation.
    pub source_count: usize,
    pub flag: Flag,
}

impl FusedValue {
    pub(crate) fn missing() -> Self {
        Self {
            value: None,
            variance: None,
            source_count: 0,
            flag: Flag::Missing,
        }
    }
}

/// All fused variables for one date. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedDay {
    pub date: NaiveDate,
    pub values: BTreeMap<ClimateVariable, FusedValue>,
}

impl FusedDay {
    /// The fused value for `variable`, when present and not MISSING.
    pub fn value(&self, variable: ClimateVariable) -> Option<f64> {
        self.values.get(&variable).and_then(|v| v.value)
    }
}

/// The complete fused series handed to the downstream consumer, together
/// with per-source outcome metadata for transparency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSeries {
    pub coordinate: Coordinate,
    pub range: DateRange,
    /// One entry per day of `range`, in date order.
    pub days: Vec<FusedDay>,
    /// Sources whose observations contributed, sorted by id.
    pub sources_used: Vec<SourceId>,
    /// Sources that were eligible but failed for this request, with the
    /// failure reason. Informational only; the series itself is usable.
    pub failures: BTreeMap<SourceId, String>,
}

impl FusedSeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedDay> {
        self.days.iter()
    }
}
