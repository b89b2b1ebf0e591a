//! Shared HTTP plumbing for the upstream adapters.

use crate::clients::error::SourceError;
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;

/// Identification sent to upstreams that mandate a User-Agent
/// (MET Norway, NWS).
pub(crate) const USER_AGENT: &str = "climafusion/0.1 (climate data fusion library)";

/// GETs `url` and decodes the body as JSON, mapping HTTP-level failures the
/// same way everywhere: a status error keeps its status for the retry
/// policy, anything else is a network error.
pub(crate) async fn get_json(client: &Client, url: &str) -> Result<Value, SourceError> {
    info!("fetching {url}");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::Network(url.to_string(), e))?;

    let response = match response.error_for_status() {
        Ok(resp) => resp,
        Err(e) => {
            warn!("HTTP error for {url}: {e:?}");
            return Err(if let Some(status) = e.status() {
                SourceError::HttpStatus {
                    url: url.to_string(),
                    status,
                    source: e,
                }
            } else {
                SourceError::Network(url.to_string(), e)
            });
        }
    };

    response
        .json::<Value>()
        .await
        .map_err(|e| SourceError::Network(url.to_string(), e))
}
