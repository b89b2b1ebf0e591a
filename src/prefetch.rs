//! Cache warm-up for configured locations.
//!
//! Deployments that know their hot locations ahead of time (a dashboard's
//! pinned sites, a scheduler's field list) run [`warm`] periodically so that
//! interactive requests hit a warm cache. Warm-up is strictly best-effort:
//! a failing location is logged and skipped, never fatal.

use crate::climafusion::ClimaFusion;
use crate::types::context::RequestContext;
use crate::types::coordinate::Coordinate;
use log::{info, warn};
use serde::Deserialize;

/// One location to keep warm, typically deserialized from deployment
/// configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrefetchTarget {
    /// Human-readable name for logs and the warm report.
    pub label: String,
    pub coordinate: Coordinate,
    /// The context whose representative range gets prefetched.
    pub context: RequestContext,
}

/// What one warm-up pass achieved.
#[derive(Debug, Default, PartialEq)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    /// Labels that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Prefetches each target's representative range through the full pipeline,
/// populating the cache as a side effect. Targets run sequentially; the
/// per-request concurrency bound already parallelizes the sources within
/// each one.
pub async fn warm(client: &ClimaFusion, targets: &[PrefetchTarget]) -> WarmReport {
    let mut report = WarmReport::default();

    for target in targets {
        let result = client
            .fetch_fused()
            .coordinate(target.coordinate)
            .context(target.context)
            .call()
            .await;

        match result {
            Ok(fused) => {
                info!(
                    "warmed '{}' ({} context): {} day(s) from {} source(s)",
                    target.label,
                    target.context,
                    fused.len(),
                    fused.sources_used.len()
                );
                report.warmed.push(target.label.clone());
            }
            Err(e) => {
                warn!("warm-up failed for '{}': {e}", target.label);
                report.failed.push((target.label.clone(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clients::error::SourceError;
    use crate::clients::SourceClient;
    use crate::fusion::FusionConfig;
    use crate::manager::FetchConfig;
    use crate::types::coordinate::Coverage;
    use crate::types::date_range::DateRange;
    use crate::types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
    use crate::types::observation::{observations_for_range, SourceSeries};
    use crate::types::variable::ClimateVariable;
    use crate::validation::Validator;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct ConstSource {
        descriptor: SourceDescriptor,
    }

    impl ConstSource {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                descriptor: SourceDescriptor {
                    id: id.into(),
                    name: id.to_string(),
                    coverage: Coverage::Global,
                    window: DateWindow {
                        // Wide open so any context's default range fits.
                        start: WindowEdge::Offset(-365),
                        end_offset_days: 5,
                    },
                    variables: ClimateVariable::all_set(),
                    priority: 1,
                    reliability: 0.9,
                },
            })
        }
    }

    #[async_trait]
    impl SourceClient for ConstSource {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.descriptor
        }

        async fn fetch_raw(
            &self,
            _coordinate: Coordinate,
            _range: DateRange,
        ) -> Result<serde_json::Value, SourceError> {
            Ok(json!({}))
        }

        fn normalize(
            &self,
            _raw: &serde_json::Value,
            coordinate: Coordinate,
            range: DateRange,
        ) -> Result<SourceSeries, SourceError> {
            let mut series = SourceSeries::new(self.descriptor.id.clone(), coordinate, range);
            series.insert_variable(
                ClimateVariable::TempMean,
                observations_for_range(&range, |_| Some(18.0)),
            );
            Ok(series)
        }
    }

    fn target(label: &str, lat: f64, lon: f64, context: RequestContext) -> PrefetchTarget {
        PrefetchTarget {
            label: label.to_string(),
            coordinate: Coordinate::new(lat, lon).unwrap(),
            context,
        }
    }

    #[tokio::test]
    async fn warms_configured_targets() {
        let client = ClimaFusion::with_components(
            vec![ConstSource::new("const") as Arc<dyn SourceClient>],
            Arc::new(MemoryCache::new()),
            FetchConfig::default(),
            Validator::with_defaults(),
            FusionConfig::default(),
        );

        let targets = [
            target("new_york", 40.71, -74.0, RequestContext::Forecast),
            target("addis_ababa", 9.03, 38.74, RequestContext::Dashboard),
        ];
        let report = warm(&client, &targets).await;

        assert_eq!(report.warmed, vec!["new_york", "addis_ababa"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn a_failing_target_does_not_stop_the_pass() {
        // No sources registered: every target fails with no coverage, and
        // the pass still visits all of them.
        let client = ClimaFusion::with_components(
            vec![],
            Arc::new(MemoryCache::new()),
            FetchConfig::default(),
            Validator::with_defaults(),
            FusionConfig::default(),
        );

        let targets = [
            target("a", 40.71, -74.0, RequestContext::Forecast),
            target("b", 9.03, 38.74, RequestContext::Forecast),
        ];
        let report = warm(&client, &targets).await;

        assert!(report.warmed.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].1.contains("no source covers"));
    }

    #[test]
    fn targets_deserialize_from_config() {
        let json = r#"{
            "label": "piracicaba",
            "coordinate": { "lat": -22.7, "lon": -47.6 },
            "context": "dashboard"
        }"#;
        let parsed: PrefetchTarget = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.label, "piracicaba");
        assert_eq!(parsed.context, RequestContext::Dashboard);
    }
}
