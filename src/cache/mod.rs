//! The cache layer: a key-value contract over normalized source series with
//! per-entry expiry, plus the in-memory store used by default.
//!
//! The source manager is cache-first: every eligible source gets one cache
//! lookup before any network call, and every successful fetch is written
//! back with a TTL chosen by data recency. External stores (Redis and the
//! like) implement [`CacheStore`]; nothing in the core depends on a
//! particular backend.

use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::observation::{SourceId, SourceSeries};
use crate::types::variable::ClimateVariable;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// TTL for entries whose range touches the forecast horizon; forecasts are
/// re-issued frequently upstream.
pub const FORECAST_TTL: Duration = Duration::from_secs(60 * 60);

/// TTL for entries ending within the last week; recent observations still
/// get corrected upstream.
pub const RECENT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// TTL for stable historical entries.
pub const HISTORICAL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Coordinate precision (decimal places) baked into cache keys. Two decimals
/// is roughly a kilometre, coarse enough that nearby repeat requests collide
/// on the same entry.
pub const KEY_COORDINATE_DECIMALS: u32 = 2;

/// Picks a TTL from how recent the requested range is. One fixed TTL either
/// stales forecasts or evicts stable history too aggressively, so the policy
/// splits on the range's distance from today.
pub fn ttl_for_range(range: &DateRange, today: NaiveDate) -> Duration {
    if range.end >= today {
        FORECAST_TTL
    } else if (today - range.end).num_days() <= 7 {
        RECENT_TTL
    } else {
        HISTORICAL_TTL
    }
}

/// A deterministic cache key for one (source, place, period, variable set)
/// combination.
///
/// The coordinate is rounded to [`KEY_COORDINATE_DECIMALS`] before keying so
/// semantically identical requests collide regardless of floating-point
/// formatting. The variable set is hashed in its canonical (sorted) order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        source: &SourceId,
        coordinate: &Coordinate,
        range: &DateRange,
        variables: &BTreeSet<ClimateVariable>,
    ) -> Self {
        let (lat, lon) = coordinate.scaled(KEY_COORDINATE_DECIMALS);
        // DefaultHasher::new() uses fixed keys, so the digest is stable for
        // a given variable set.
        let mut hasher = DefaultHasher::new();
        for variable in variables {
            variable.canonical_name().hash(&mut hasher);
        }
        CacheKey(format!(
            "{}:{}:{}:{}:{}:{:016x}",
            source,
            lat,
            lon,
            range.start,
            range.end,
            hasher.finish()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The key-value contract the source manager requires of a cache backend.
///
/// Entries are replaced whole; there is no partial update and no cross-key
/// transaction. Two concurrent requests may both miss and both `set` — the
/// second write wins, which is harmless because both hold equivalent data.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<SourceSeries>;
    async fn set(&self, key: CacheKey, series: SourceSeries, ttl: Duration);
    async fn invalidate(&self, key: &CacheKey);
}

struct MemoryEntry {
    series: SourceSeries,
    expires_at: Instant,
}

/// In-process [`CacheStore`] backed by a mutexed map, with lazy expiry on
/// read. Suitable for single-process deployments and tests; multi-process
/// deployments plug in an external store instead.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<SourceSeries> {
        let mut entries = self.entries.lock().await;
        match entries.get(key.as_str()) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.series.clone()),
            Some(_) => {
                debug!("cache entry expired: {key}");
                entries.remove(key.as_str());
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: CacheKey, series: SourceSeries, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.0,
            MemoryEntry {
                series,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().await;
        entries.remove(key.as_str());
    }
}
