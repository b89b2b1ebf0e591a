//! Per-day observations and the per-source series that carries them through
//! the pipeline.

use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::variable::ClimateVariable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of one upstream climate data service, e.g. `"nasa_power"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        SourceId(id.to_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validity of a single observation, distinct from the numeric value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// A plausible value the fusion stage may use.
    Valid,
    /// The source provided nothing for this date.
    Missing,
    /// The source provided a value outside the physical bounds for its
    /// region. The number is kept for diagnostics but never aggregated.
    OutOfRange,
}

/// One date × one variable × one source.
///
/// The validator only ever rewrites `flag`; the numeric value is preserved
/// so an out-of-range reading stays inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub flag: Flag,
}

impl DailyObservation {
    pub fn valid(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value: Some(value),
            flag: Flag::Valid,
        }
    }

    pub fn missing(date: NaiveDate) -> Self {
        Self {
            date,
            value: None,
            flag: Flag::Missing,
        }
    }

    /// The numeric value, but only when the observation is usable downstream.
    pub fn usable(&self) -> Option<f64> {
        match self.flag {
            Flag::Valid => self.value,
            Flag::Missing | Flag::OutOfRange => None,
        }
    }
}

/// Builds one observation slot per day of `range`, pulling the value for each
/// date from `value_at`. Dates the closure has nothing for become MISSING.
pub fn observations_for_range(
    range: &DateRange,
    mut value_at: impl FnMut(NaiveDate) -> Option<f64>,
) -> Vec<DailyObservation> {
    range
        .iter_days()
        .map(|date| match value_at(date) {
            Some(value) => DailyObservation::valid(date, value),
            None => DailyObservation::missing(date),
        })
        .collect()
}

/// The normalized daily series one source produced for one request.
///
/// Each variable holds exactly one observation slot per day of `range`, in
/// date order. A series is owned by the fetch pipeline for the duration of
/// one request and handed to the fusion engine by value; it is never shared
/// across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSeries {
    pub source: SourceId,
    pub coordinate: Coordinate,
    pub range: DateRange,
    pub values: BTreeMap<ClimateVariable, Vec<DailyObservation>>,
}

impl SourceSeries {
    pub fn new(source: SourceId, coordinate: Coordinate, range: DateRange) -> Self {
        Self {
            source,
            coordinate,
            range,
            values: BTreeMap::new(),
        }
    }

    /// Inserts a full column for `variable`. The column length must match the
    /// range; shorter or longer columns indicate an adapter bug.
    pub fn insert_variable(&mut self, variable: ClimateVariable, column: Vec<DailyObservation>) {
        debug_assert_eq!(column.len() as i64, self.range.days());
        self.values.insert(variable, column);
    }

    pub fn observations(&self, variable: ClimateVariable) -> Option<&[DailyObservation]> {
        self.values.get(&variable).map(Vec::as_slice)
    }

    pub fn variables(&self) -> impl Iterator<Item = ClimateVariable> + '_ {
        self.values.keys().copied()
    }

    /// Number of VALID observations across all variables.
    pub fn valid_count(&self) -> usize {
        self.values
            .values()
            .flatten()
            .filter(|obs| obs.flag == Flag::Valid)
            .count()
    }
}
