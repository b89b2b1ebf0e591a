//! The main entry point: one client that wires source resolution, fetching,
//! validation and fusion into a single call.

use crate::cache::{CacheStore, MemoryCache};
use crate::clients::{default_clients, SourceClient};
use crate::error::ClimaFusionError;
use crate::fusion::{FusionConfig, FusionEngine};
use crate::manager::{FetchConfig, SourceManager};
use crate::types::context::RequestContext;
use crate::types::coordinate::Coordinate;
use crate::types::date_range::DateRange;
use crate::types::descriptor::SourceDescriptor;
use crate::types::fused::FusedSeries;
use crate::types::observation::{SourceId, SourceSeries};
use crate::types::variable::ClimateVariable;
use crate::validation::Validator;
use bon::bon;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// The main client for fetching fused climate series.
///
/// One `ClimaFusion` owns the full pipeline: it resolves which upstream
/// sources can serve a request, fetches from all of them concurrently
/// (cache-first, with retry), flags physically implausible values, and fuses
/// the surviving per-source series into a single best-estimate series with
/// per-day uncertainty.
///
/// Create an instance with [`ClimaFusion::new()`] for the default source
/// registry and in-memory cache, or with [`ClimaFusion::with_components()`]
/// to plug in custom sources, an external cache backend or different tuning.
///
/// # Examples
///
/// ```no_run
/// # use climafusion::{ClimaFusion, ClimaFusionError, Coordinate, RequestContext};
/// # async fn run() -> Result<(), ClimaFusionError> {
/// let client = ClimaFusion::new();
/// let fused = client
///     .fetch_fused()
///     .coordinate(Coordinate::new(40.71, -74.00)?)
///     .context(RequestContext::Forecast)
///     .call()
///     .await?;
/// for day in fused.iter() {
///     println!("{}: {:?}", day.date, day.values);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ClimaFusion {
    manager: SourceManager,
    validator: Validator,
    fusion: FusionEngine,
}

impl Default for ClimaFusion {
    fn default() -> Self {
        Self::new()
    }
}

#[bon]
impl ClimaFusion {
    /// Client over the default source registry (the two Open-Meteo
    /// endpoints, NASA POWER, MET Norway and NWS), the built-in two-tier
    /// validation table and an in-process cache.
    pub fn new() -> Self {
        Self::with_components(
            default_clients(),
            Arc::new(MemoryCache::new()),
            FetchConfig::default(),
            Validator::with_defaults(),
            FusionConfig::default(),
        )
    }

    /// Client from explicit parts, for custom source sets, external cache
    /// backends or tuned retry/fusion behavior.
    pub fn with_components(
        clients: Vec<Arc<dyn SourceClient>>,
        cache: Arc<dyn CacheStore>,
        fetch_config: FetchConfig,
        validator: Validator,
        fusion_config: FusionConfig,
    ) -> Self {
        Self {
            manager: SourceManager::new(clients, cache, fetch_config),
            validator,
            fusion: FusionEngine::new(fusion_config),
        }
    }

    /// Descriptors of every registered source, in registration order.
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        self.manager.descriptors().cloned().collect()
    }

    /// Which sources would serve this request, best first, without touching
    /// the network.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.coordinate(Coordinate)`: **Required.** The location to resolve for.
    /// * `.context(RequestContext)`: **Required.** The usage mode; decides
    ///   the ordering policy.
    /// * `.range(Option<DateRange>)`: Optional. Defaults to the context's
    ///   representative range.
    /// * `.variables(Option<BTreeSet<ClimateVariable>>)`: Optional. Defaults
    ///   to all canonical variables.
    #[builder]
    pub fn resolve_sources(
        &self,
        coordinate: Coordinate,
        context: RequestContext,
        range: Option<DateRange>,
        variables: Option<BTreeSet<ClimateVariable>>,
    ) -> Vec<SourceDescriptor> {
        let today = Utc::now().date_naive();
        let range = range.unwrap_or_else(|| context.default_range(today));
        let variables = variables.unwrap_or_else(ClimateVariable::all_set);
        self.manager
            .resolve(&coordinate, &range, context, &variables, today)
            .into_iter()
            .map(|client| client.descriptor().clone())
            .collect()
    }

    /// Fetches, validates and fuses climate data for one location and range.
    ///
    /// This is the primary operation. It degrades gracefully: individual
    /// source failures are reported in the result's `failures` map rather
    /// than failing the request, and days nobody could provide stay MISSING
    /// rather than being interpolated.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.coordinate(Coordinate)`: **Required.** The location of interest.
    /// * `.context(RequestContext)`: **Required.** The usage mode; constrains
    ///   the legal date ranges.
    /// * `.range(Option<DateRange>)`: Optional. Defaults to the context's
    ///   representative range (e.g. today through today + 5 for forecasts).
    /// * `.variables(Option<BTreeSet<ClimateVariable>>)`: Optional. Defaults
    ///   to all canonical variables.
    ///
    /// # Errors
    ///
    /// Returns [`ClimaFusionError::Context`] when the range violates the
    /// context's constraints, [`ClimaFusionError::Manager`] when no source
    /// covers the request or every resolved source failed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use climafusion::{ClimaFusion, ClimaFusionError, ClimateVariable, Coordinate, DateRange, RequestContext};
    /// # use chrono::NaiveDate;
    /// # async fn run() -> Result<(), ClimaFusionError> {
    /// let client = ClimaFusion::new();
    /// let fused = client
    ///     .fetch_fused()
    ///     .coordinate(Coordinate::new(40.71, -74.00)?)
    ///     .context(RequestContext::Historical)
    ///     .range(DateRange::new(
    ///         NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
    ///         NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
    ///     )?)
    ///     .call()
    ///     .await?;
    /// println!(
    ///     "fused {} day(s) from {:?}, {} source(s) failed",
    ///     fused.len(),
    ///     fused.sources_used,
    ///     fused.failures.len()
    /// );
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn fetch_fused(
        &self,
        coordinate: Coordinate,
        context: RequestContext,
        range: Option<DateRange>,
        variables: Option<BTreeSet<ClimateVariable>>,
    ) -> Result<FusedSeries, ClimaFusionError> {
        let today = Utc::now().date_naive();
        let range = range.unwrap_or_else(|| context.default_range(today));
        let variables = variables.unwrap_or_else(ClimateVariable::all_set);

        self.fetch_fused_at(coordinate, context, range, &variables, today)
            .await
    }

    /// The date-injectable core of [`fetch_fused`](Self::fetch_fused);
    /// everything after "what is today" lives here so tests can pin the
    /// clock.
    pub(crate) async fn fetch_fused_at(
        &self,
        coordinate: Coordinate,
        context: RequestContext,
        range: DateRange,
        variables: &BTreeSet<ClimateVariable>,
        today: NaiveDate,
    ) -> Result<FusedSeries, ClimaFusionError> {
        context.check(&range, today)?;

        let reliability: HashMap<SourceId, f64> = self
            .manager
            .descriptors()
            .map(|d| (d.id.clone(), d.reliability))
            .collect();

        let outcome = self
            .manager
            .fetch(coordinate, range, context, variables, today)
            .await?;

        let validated: HashMap<SourceId, SourceSeries> = outcome
            .series
            .into_iter()
            .map(|(id, series)| (id, self.validator.validate(series)))
            .collect();

        let mut fused = self.fusion.fuse(&validated, &reliability)?;
        fused.failures = outcome
            .failures
            .into_iter()
            .map(|(id, failure)| (id, failure.reason))
            .collect();
        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::coordinate::Coverage;
    use crate::types::descriptor::{DateWindow, WindowEdge};
    use crate::types::observation::observations_for_range;
    use async_trait::async_trait;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// A source that always serves a constant temperature, with one value
    /// outside physical bounds to exercise the validation stage.
    struct FixedSource {
        descriptor: SourceDescriptor,
        temps: Vec<Option<f64>>,
    }

    impl FixedSource {
        fn new(id: &str, reliability: f64, temps: Vec<Option<f64>>) -> Arc<Self> {
            Arc::new(Self {
                descriptor: SourceDescriptor {
                    id: id.into(),
                    name: id.to_string(),
                    coverage: Coverage::Global,
                    window: DateWindow {
                        start: WindowEdge::Fixed(d(1981, 1, 1)),
                        end_offset_days: 5,
                    },
                    variables: ClimateVariable::all_set(),
                    priority: 1,
                    reliability,
                },
                temps,
            })
        }
    }

    #[async_trait]
    impl SourceClient for FixedSource {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn fetch_raw(
            &self,
            _coordinate: Coordinate,
            _range: DateRange,
        ) -> Result<serde_json::Value, crate::clients::error::SourceError> {
            Ok(json!({}))
        }

        fn normalize(
            &self,
            _raw: &serde_json::Value,
            coordinate: Coordinate,
            range: DateRange,
        ) -> Result<SourceSeries, crate::clients::error::SourceError> {
            let mut series = SourceSeries::new(self.descriptor.id.clone(), coordinate, range);
            series.insert_variable(
                ClimateVariable::TempMean,
                observations_for_range(&range, |date| {
                    self.temps[range.index_of(date).unwrap_or(0)]
                }),
            );
            Ok(series)
        }
    }

    fn client(sources: Vec<Arc<dyn SourceClient>>) -> ClimaFusion {
        ClimaFusion::with_components(
            sources,
            Arc::new(MemoryCache::new()),
            FetchConfig::default(),
            Validator::with_defaults(),
            FusionConfig::default(),
        )
    }

    #[tokio::test]
    async fn end_to_end_fuses_two_sources() {
        let today = d(2024, 6, 30);
        let range = DateRange::new(today, d(2024, 7, 5)).unwrap();
        let temps_a = vec![Some(20.0); 6];
        let temps_b = vec![Some(22.0); 6];
        let fused = client(vec![
            FixedSource::new("a", 0.9, temps_a) as Arc<dyn SourceClient>,
            FixedSource::new("b", 0.8, temps_b) as _,
        ])
        .fetch_fused_at(
            Coordinate::new(40.71, -74.0).unwrap(),
            RequestContext::Forecast,
            range,
            &ClimateVariable::all_set(),
            today,
        )
        .await
        .unwrap();

        assert_eq!(fused.len(), 6);
        assert_eq!(fused.sources_used.len(), 2);
        let first = fused.days[0].value(ClimateVariable::TempMean).unwrap();
        assert!(first > 20.0 && first < 22.0);
        assert!(fused.failures.is_empty());
    }

    #[tokio::test]
    async fn out_of_bounds_values_are_excluded_from_fusion() {
        let today = d(2024, 6, 30);
        let range = DateRange::new(today, d(2024, 7, 5)).unwrap();
        // -200 °C violates even the global bounds; the other source's value
        // must pass through exactly.
        let mut temps_bad = vec![Some(20.0); 6];
        temps_bad[0] = Some(-200.0);
        let fused = client(vec![
            FixedSource::new("good", 0.9, vec![Some(21.0); 6]) as Arc<dyn SourceClient>,
            FixedSource::new("bad", 0.9, temps_bad) as _,
        ])
        .fetch_fused_at(
            Coordinate::new(40.71, -74.0).unwrap(),
            RequestContext::Forecast,
            range,
            &ClimateVariable::all_set(),
            today,
        )
        .await
        .unwrap();

        let first = &fused.days[0].values[&ClimateVariable::TempMean];
        assert_eq!(first.value, Some(21.0));
        assert_eq!(first.source_count, 1);
        // Later days fuse both sources again.
        assert_eq!(fused.days[1].values[&ClimateVariable::TempMean].source_count, 2);
    }

    #[tokio::test]
    async fn illegal_range_fails_before_any_fetch() {
        let today = d(2024, 6, 30);
        // Historical range ending yesterday is too recent.
        let range = DateRange::new(d(2024, 6, 1), d(2024, 6, 29)).unwrap();
        let err = client(vec![
            FixedSource::new("a", 0.9, vec![Some(20.0); 29]) as Arc<dyn SourceClient>,
        ])
        .fetch_fused_at(
            Coordinate::new(40.71, -74.0).unwrap(),
            RequestContext::Historical,
            range,
            &ClimateVariable::all_set(),
            today,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClimaFusionError::Context(_)));
    }
}
