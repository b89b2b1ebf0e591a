use crate::types::observation::SourceId;
use std::time::Duration;
use thiserror::Error;

/// Failure of one upstream source call or its normalization step.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {0} timed out after {1:?}")]
    Timeout(SourceId, Duration),

    #[error("failed to decode payload from {source_id}: {message}")]
    Decode { source_id: SourceId, message: String },

    #[error("payload from {source_id} is missing field '{field}'")]
    MissingField { source_id: SourceId, field: String },
}

impl SourceError {
    /// Whether the retry policy may try again: timeouts, connection-level
    /// failures and server 5xx are transient; client errors and payloads we
    /// cannot decode are not.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(..) | SourceError::Timeout(..) => true,
            SourceError::HttpStatus { status, .. } => status.is_server_error(),
            SourceError::Decode { .. } | SourceError::MissingField { .. } => false,
        }
    }
}
