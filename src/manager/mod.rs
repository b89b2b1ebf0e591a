//! The source manager: resolves which upstreams can serve a request and
//! fetches from all of them concurrently, cache-first, with bounded
//! parallelism and per-source retry.
//!
//! Failure isolation is the core property: one slow or broken upstream never
//! takes down a request. Each source runs in its own task under its own
//! deadline, and the manager returns whatever subset succeeded alongside the
//! per-source failure reasons. Only zero coverage or zero survivors become
//! request-level errors.

pub mod error;

use crate::cache::{ttl_for_range, CacheKey, CacheStore};
use crate::clients::error::SourceError;
use crate::clients::SourceClient;
use crate::manager::error::ManagerError;
use crate::types::context::RequestContext;
use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::descriptor::SourceDescriptor;
use crate::types::observation::{SourceId, SourceSeries};
use crate::types::variable::ClimateVariable;
use chrono::NaiveDate;
use futures_util::future::join_all;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

/// Fetch pipeline tuning.
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    /// Upper bound on sources fetched in parallel within one request.
    pub max_concurrency: usize,
    /// Attempts per source, first try included.
    pub attempts: u32,
    /// Backoff before retry `n` is `backoff_base * 2^(n-1)`.
    pub backoff_base: Duration,
    /// Deadline for a single network attempt.
    pub attempt_timeout: Duration,
    /// Deadline for one source's whole pipeline, retries and backoff
    /// included. Sources that finish earlier are unaffected by a straggler
    /// hitting this.
    pub source_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            attempts: 3,
            backoff_base: Duration::from_millis(250),
            attempt_timeout: Duration::from_secs(10),
            source_timeout: Duration::from_secs(45),
        }
    }
}

/// Why one source produced no series for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub reason: String,
    /// Network attempts actually made (0 when the failure precedes I/O).
    pub attempts: u32,
}

/// Everything one fetch produced: the per-source series that succeeded, the
/// per-source reasons for those that did not, and which series came from
/// cache rather than the network.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub series: HashMap<SourceId, SourceSeries>,
    pub failures: BTreeMap<SourceId, FetchFailure>,
    pub from_cache: BTreeSet<SourceId>,
}

pub struct SourceManager {
    clients: Vec<Arc<dyn SourceClient>>,
    cache: Arc<dyn CacheStore>,
    config: FetchConfig,
    semaphore: Arc<Semaphore>,
}

impl SourceManager {
    pub fn new(
        clients: Vec<Arc<dyn SourceClient>>,
        cache: Arc<dyn CacheStore>,
        config: FetchConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            clients,
            cache,
            config,
            semaphore,
        }
    }

    /// Descriptors of every registered source, resolution order not applied.
    pub fn descriptors(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.clients.iter().map(|c| c.descriptor())
    }

    /// The sources able to serve this request, best first.
    ///
    /// Filters on coverage, window and variable overlap, then orders by the
    /// context's preference: regional before global for forecasts, deepest
    /// archive first otherwise. Resolution is pure; no I/O happens here.
    pub fn resolve(
        &self,
        coordinate: &Coordinate,
        range: &DateRange,
        context: RequestContext,
        variables: &BTreeSet<ClimateVariable>,
        today: NaiveDate,
    ) -> Vec<Arc<dyn SourceClient>> {
        let mut eligible: Vec<Arc<dyn SourceClient>> = self
            .clients
            .iter()
            .filter(|client| client.descriptor().eligible(coordinate, range, variables, today))
            .cloned()
            .collect();
        eligible.sort_by_key(|client| client.descriptor().order_key(context, today));

        debug!(
            "resolved {} of {} source(s) for {context} at ({}, {})",
            eligible.len(),
            self.clients.len(),
            coordinate.lat,
            coordinate.lon
        );
        eligible
    }

    /// Fetches from every resolved source concurrently and returns whatever
    /// subset succeeded.
    ///
    /// Each source is checked against the cache first; a hit skips the
    /// network entirely. Misses fetch with retry under [`FetchConfig`] and
    /// write back with a recency-based TTL. Errors only when nothing could
    /// serve the request at all.
    pub async fn fetch(
        &self,
        coordinate: Coordinate,
        range: DateRange,
        context: RequestContext,
        variables: &BTreeSet<ClimateVariable>,
        today: NaiveDate,
    ) -> Result<FetchOutcome, ManagerError> {
        let resolved = self.resolve(&coordinate, &range, context, variables, today);
        if resolved.is_empty() {
            return Err(ManagerError::NoCoverage {
                lat: coordinate.lat,
                lon: coordinate.lon,
                context,
                start: range.start,
                end: range.end,
            });
        }

        let tasks = resolved.into_iter().map(|client| {
            // Key on the variables this source can actually deliver, so the
            // same entry serves requests that differ only in variables the
            // source lacks.
            let deliverable: BTreeSet<ClimateVariable> = client
                .descriptor()
                .variables
                .intersection(variables)
                .copied()
                .collect();
            tokio::spawn(fetch_one(
                client,
                Arc::clone(&self.cache),
                self.config,
                coordinate,
                range,
                deliverable,
                today,
                Arc::clone(&self.semaphore),
            ))
        });

        let mut outcome = FetchOutcome::default();
        for joined in join_all(tasks).await {
            let (id, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("source task panicked: {e}");
                    continue;
                }
            };
            match result {
                Ok((series, cached)) => {
                    if cached {
                        outcome.from_cache.insert(id.clone());
                    }
                    outcome.series.insert(id, series);
                }
                Err(failure) => {
                    warn!("source {id} failed: {}", failure.reason);
                    outcome.failures.insert(id, failure);
                }
            }
        }

        if outcome.series.is_empty() {
            return Err(ManagerError::total_failure(
                outcome
                    .failures
                    .into_iter()
                    .map(|(id, f)| (id, f.reason))
                    .collect(),
            ));
        }

        info!(
            "fetched {} source(s) ({} cached, {} failed) for {context} at ({}, {})",
            outcome.series.len(),
            outcome.from_cache.len(),
            outcome.failures.len(),
            coordinate.lat,
            coordinate.lon
        );
        Ok(outcome)
    }
}

/// One source's whole pipeline: cache lookup, bounded-concurrency fetch with
/// retry, normalization, cache write-back.
#[allow(clippy::too_many_arguments)]
async fn fetch_one(
    client: Arc<dyn SourceClient>,
    cache: Arc<dyn CacheStore>,
    config: FetchConfig,
    coordinate: Coordinate,
    range: DateRange,
    variables: BTreeSet<ClimateVariable>,
    today: NaiveDate,
    semaphore: Arc<Semaphore>,
) -> (SourceId, Result<(SourceSeries, bool), FetchFailure>) {
    let id = client.descriptor().id.clone();
    let key = CacheKey::new(&id, &coordinate, &range, &variables);

    // Cache lookup happens before taking a concurrency permit; hits cost no
    // network slot.
    if let Some(series) = cache.get(&key).await {
        debug!("cache hit for {key}");
        return (id, Ok((series, true)));
    }

    let pipeline = async {
        let _permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(FetchFailure {
                    reason: "fetch pipeline shut down".to_string(),
                    attempts: 0,
                });
            }
        };

        let raw = fetch_with_retry(client.as_ref(), &id, coordinate, range, &config).await?;

        let series = client
            .normalize(&raw, coordinate, range)
            .map_err(|e| FetchFailure {
                reason: e.to_string(),
                attempts: config.attempts,
            })?;

        cache
            .set(key, series.clone(), ttl_for_range(&range, today))
            .await;
        Ok(series)
    };

    let result = match timeout(config.source_timeout, pipeline).await {
        Ok(Ok(series)) => Ok((series, false)),
        Ok(Err(failure)) => Err(failure),
        Err(_) => Err(FetchFailure {
            reason: format!(
                "source deadline of {:?} exceeded",
                config.source_timeout
            ),
            attempts: config.attempts,
        }),
    };
    (id, result)
}

/// Retries the raw fetch on transient errors with exponential backoff.
/// Terminal errors (4xx, undecodable payloads) abort immediately.
async fn fetch_with_retry(
    client: &dyn SourceClient,
    id: &SourceId,
    coordinate: Coordinate,
    range: DateRange,
    config: &FetchConfig,
) -> Result<serde_json::Value, FetchFailure> {
    let mut last_error: Option<SourceError> = None;

    for attempt in 1..=config.attempts {
        if attempt > 1 {
            let backoff = config.backoff_base * 2u32.pow(attempt - 2);
            debug!("retrying {id} in {backoff:?} (attempt {attempt})");
            sleep(backoff).await;
        }

        let error = match timeout(config.attempt_timeout, client.fetch_raw(coordinate, range)).await
        {
            Ok(Ok(raw)) => return Ok(raw),
            Ok(Err(e)) => e,
            Err(_) => SourceError::Timeout(id.clone(), config.attempt_timeout),
        };

        if !error.is_transient() {
            return Err(FetchFailure {
                reason: error.to_string(),
                attempts: attempt,
            });
        }
        warn!("transient failure from {id} on attempt {attempt}: {error}");
        last_error = Some(error);
    }

    let last = last_error.map(|e| e.to_string()).unwrap_or_default();
    Err(FetchFailure {
        reason: format!(
            "max retries exceeded after {} attempts: {last}",
            config.attempts
        ),
        attempts: config.attempts,
    })
}
