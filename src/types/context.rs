//! Request contexts: the usage mode that constrains legal date ranges and
//! drives source priority.

use crate::types::date_range::DateRange;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Dashboard requests must cover exactly one of these lengths, chosen from a
/// fixed dropdown upstream.
pub const DASHBOARD_LENGTHS: [i64; 4] = [7, 14, 21, 30];

/// Forecast requests always span today through today plus this many days.
pub const FORECAST_HORIZON_DAYS: i64 = 5;

/// Historical requests may not end closer to today than this.
pub const HISTORICAL_MIN_AGE_DAYS: i64 = 30;

/// Historical requests are capped at this many days.
pub const HISTORICAL_MAX_LENGTH_DAYS: i64 = 90;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("historical range must end on or before {max_end} (today - 30 days), got {end}")]
    HistoricalEndTooRecent { end: NaiveDate, max_end: NaiveDate },

    #[error("historical range must be 1-90 days, got {days}")]
    HistoricalTooLong { days: i64 },

    #[error("dashboard range must end today ({today}), got {end}")]
    DashboardEndNotToday { end: NaiveDate, today: NaiveDate },

    #[error("dashboard range must span 7, 14, 21 or 30 days, got {days}")]
    DashboardBadLength { days: i64 },

    #[error("forecast range must be today ({today}) through {expected_end}, got {start} to {end}")]
    ForecastWindowMismatch {
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
        expected_end: NaiveDate,
    },
}

/// The usage mode of a request. Exactly one context applies per request and
/// it never changes after the request is created.
///
/// The context decides both which date ranges are legal ([`check`]) and how
/// eligible sources are ordered: forecast requests prefer high-resolution
/// regional forecast sources, historical requests prefer the deepest
/// validated archives.
///
/// [`check`]: RequestContext::check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestContext {
    /// Stable past data: 1-90 days, ending at least 30 days ago.
    Historical,
    /// Recent data for interactive display: 7/14/21/30 days ending today.
    Dashboard,
    /// The fixed forecast window: today through today + 5 days.
    Forecast,
}

impl RequestContext {
    /// Checks that `range` satisfies this context's constraints relative to
    /// `today`. Violations are surfaced before any source is contacted.
    pub fn check(&self, range: &DateRange, today: NaiveDate) -> Result<(), ContextError> {
        match self {
            RequestContext::Historical => {
                let max_end = today - Duration::days(HISTORICAL_MIN_AGE_DAYS);
                if range.end > max_end {
                    return Err(ContextError::HistoricalEndTooRecent {
                        end: range.end,
                        max_end,
                    });
                }
                if range.days() > HISTORICAL_MAX_LENGTH_DAYS {
                    return Err(ContextError::HistoricalTooLong { days: range.days() });
                }
                Ok(())
            }
            RequestContext::Dashboard => {
                if range.end != today {
                    return Err(ContextError::DashboardEndNotToday {
                        end: range.end,
                        today,
                    });
                }
                if !DASHBOARD_LENGTHS.contains(&range.days()) {
                    return Err(ContextError::DashboardBadLength { days: range.days() });
                }
                Ok(())
            }
            RequestContext::Forecast => {
                let expected_end = today + Duration::days(FORECAST_HORIZON_DAYS);
                if range.start != today || range.end != expected_end {
                    return Err(ContextError::ForecastWindowMismatch {
                        start: range.start,
                        end: range.end,
                        today,
                        expected_end,
                    });
                }
                Ok(())
            }
        }
    }

    /// A representative legal range for this context, used by the prefetch
    /// warm-up contract where callers configure only a context per location.
    pub fn default_range(&self, today: NaiveDate) -> DateRange {
        let (start, end) = match self {
            RequestContext::Historical => {
                let end = today - Duration::days(HISTORICAL_MIN_AGE_DAYS);
                (end - Duration::days(HISTORICAL_MAX_LENGTH_DAYS - 1), end)
            }
            RequestContext::Dashboard => (today - Duration::days(6), today),
            RequestContext::Forecast => (today, today + Duration::days(FORECAST_HORIZON_DAYS)),
        };
        DateRange { start, end }
    }

    pub(crate) fn id(&self) -> &'static str {
        match self {
            RequestContext::Historical => "historical",
            RequestContext::Dashboard => "dashboard",
            RequestContext::Forecast => "forecast",
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
