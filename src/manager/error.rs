use crate::types::context::RequestContext;
use crate::types::observation::SourceId;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Request-level failure of the source manager.
///
/// Individual source failures are not errors — the pipeline degrades to the
/// sources that worked. Only an unservable request surfaces here.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No registered source covers the coordinate, range and variable set.
    #[error(
        "no source covers ({lat}, {lon}) for {context} range {start} to {end}"
    )]
    NoCoverage {
        lat: f64,
        lon: f64,
        context: RequestContext,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Every resolved source failed; per-source reasons are preserved.
    #[error("all {count} resolved source(s) failed: {summary}")]
    TotalSourceFailure {
        count: usize,
        summary: String,
        failures: BTreeMap<SourceId, String>,
    },
}

impl ManagerError {
    pub(crate) fn total_failure(failures: BTreeMap<SourceId, String>) -> Self {
        let summary = failures
            .iter()
            .map(|(id, reason)| format!("{id}: {reason}"))
            .collect::<Vec<_>>()
            .join("; ");
        ManagerError::TotalSourceFailure {
            count: failures.len(),
            summary,
            failures,
        }
    }
}
