//! Static per-source metadata: coverage, temporal window, variable set,
//! priority and reliability.
//!
//! Descriptors are built once at process start (or deserialized from
//! external configuration) and never mutated afterwards.

use crate::types::context::RequestContext;
use crate::types::coordinate::{Coordinate, Coverage};
use crate::types::date_range::DateRange;
use crate::types::observation::SourceId;
use crate::types::variable::ClimateVariable;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One edge of a source's supported date window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEdge {
    /// A fixed calendar date, e.g. the first day of an archive.
    Fixed(NaiveDate),
    /// An offset in days relative to "today" (negative = past).
    Offset(i64),
}

impl WindowEdge {
    fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            WindowEdge::Fixed(date) => *date,
            WindowEdge::Offset(days) => today + Duration::days(*days),
        }
    }
}

/// The date window a source supports, expressed relative to "today" so the
/// descriptor itself can stay static while the window slides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: WindowEdge,
    /// Days relative to today for the latest supported date
    /// (e.g. -2 for an archive with a two-day ingest delay, +5 for a
    /// five-day forecast horizon).
    pub end_offset_days: i64,
}

impl DateWindow {
    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        self.start.resolve(today)
    }

    pub fn latest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.end_offset_days)
    }

    pub fn covers(&self, range: &DateRange, today: NaiveDate) -> bool {
        self.earliest(today) <= range.start && range.end <= self.latest(today)
    }
}

/// Static description of one upstream climate service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub name: String,
    pub coverage: Coverage,
    pub window: DateWindow,
    pub variables: BTreeSet<ClimateVariable>,
    /// Smaller is better; ties between sources of the same rank.
    pub priority: u8,
    /// Static reliability score in (0, 1], feeding fusion weights.
    pub reliability: f64,
}

impl SourceDescriptor {
    /// Whether this source can serve the request at all: coordinate inside
    /// its coverage, range inside its window, and at least one requested
    /// variable provided.
    pub fn eligible(
        &self,
        coordinate: &Coordinate,
        range: &DateRange,
        variables: &BTreeSet<ClimateVariable>,
        today: NaiveDate,
    ) -> bool {
        self.coverage.contains(coordinate)
            && self.window.covers(range, today)
            && self.variables.intersection(variables).next().is_some()
    }

    /// Context-specific ordering key; lower sorts first.
    ///
    /// Forecast requests rank regional (bounded-coverage, high-resolution)
    /// sources ahead of global coarse ones. Historical and dashboard
    /// requests rank the deepest archive first.
    pub(crate) fn order_key(&self, context: RequestContext, today: NaiveDate) -> (u8, i64, u8) {
        match context {
            RequestContext::Forecast => {
                let coverage_rank = match self.coverage {
                    Coverage::Bounded(_) => 0,
                    Coverage::Global => 1,
                };
                (coverage_rank, self.priority as i64, 0)
            }
            RequestContext::Historical | RequestContext::Dashboard => {
                let archive_depth = self
                    .window
                    .earliest(today)
                    .signed_duration_since(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap())
                    .num_days();
                (0, archive_depth, self.priority)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::coordinate::BoundingBox;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn descriptor(id: &str, coverage: Coverage, window: DateWindow) -> SourceDescriptor {
        SourceDescriptor {
            id: id.into(),
            name: id.to_string(),
            coverage,
            window,
            variables: ClimateVariable::all_set(),
            priority: 1,
            reliability: 0.9,
        }
    }

    #[test]
    fn window_covers_resolves_relative_edges() {
        let today = d(2024, 6, 30);
        let window = DateWindow {
            start: WindowEdge::Fixed(d(1990, 1, 1)),
            end_offset_days: -2,
        };
        let inside = DateRange::new(d(2020, 1, 1), d(2020, 3, 1)).unwrap();
        assert!(window.covers(&inside, today));

        // Ends yesterday, past the two-day ingest delay.
        let too_recent = DateRange::new(d(2024, 6, 20), d(2024, 6, 29)).unwrap();
        assert!(!window.covers(&too_recent, today));

        let forecast_window = DateWindow {
            start: WindowEdge::Offset(0),
            end_offset_days: 5,
        };
        let horizon = DateRange::new(today, d(2024, 7, 5)).unwrap();
        assert!(forecast_window.covers(&horizon, today));
        assert!(!forecast_window.covers(&DateRange::new(d(2024, 6, 29), today).unwrap(), today));
    }

    #[test]
    fn eligibility_requires_variable_overlap() {
        let today = d(2024, 6, 30);
        let window = DateWindow {
            start: WindowEdge::Fixed(d(1990, 1, 1)),
            end_offset_days: 0,
        };
        let mut desc = descriptor("only_temp", Coverage::Global, window);
        desc.variables = [ClimateVariable::TempMean].into_iter().collect();

        let coord = Coordinate::new(0.0, 0.0).unwrap();
        let range = DateRange::new(d(2020, 1, 1), d(2020, 1, 10)).unwrap();

        let wants_temp: BTreeSet<_> = [ClimateVariable::TempMean].into_iter().collect();
        let wants_wind: BTreeSet<_> = [ClimateVariable::WindSpeedMean].into_iter().collect();
        assert!(desc.eligible(&coord, &range, &wants_temp, today));
        assert!(!desc.eligible(&coord, &range, &wants_wind, today));
    }

    #[test]
    fn forecast_ordering_prefers_regional_sources() {
        let today = d(2024, 6, 30);
        let window = DateWindow {
            start: WindowEdge::Offset(0),
            end_offset_days: 5,
        };
        let regional = descriptor(
            "regional",
            Coverage::Bounded(BoundingBox::new(-125.0, 24.0, -66.0, 49.0)),
            window,
        );
        let mut global = descriptor("global", Coverage::Global, window);
        global.priority = 0; // even a better priority does not outrank regional

        assert!(
            regional.order_key(RequestContext::Forecast, today)
                < global.order_key(RequestContext::Forecast, today)
        );
    }

    #[test]
    fn historical_ordering_prefers_deepest_archive() {
        let today = d(2024, 6, 30);
        let older = descriptor(
            "older",
            Coverage::Global,
            DateWindow {
                start: WindowEdge::Fixed(d(1981, 1, 1)),
                end_offset_days: 0,
            },
        );
        let newer = descriptor(
            "newer",
            Coverage::Global,
            DateWindow {
                start: WindowEdge::Fixed(d(1990, 1, 1)),
                end_offset_days: 0,
            },
        );
        assert!(
            older.order_key(RequestContext::Historical, today)
                < newer.order_key(RequestContext::Historical, today)
        );
    }
}
