//! The statistical fusion engine.
//!
//! Merges the validated per-source series for one request into a single
//! best-estimate series with per-day variance, one sequential filter pass
//! over the date axis per variable. Each source's observation is treated as
//! a noisy measurement of the same true value and combined by a linear
//! minimum-variance estimator: inverse-variance weighted mean, with the
//! standard covariance reduction for independent measurements. A running
//! state estimate is carried along the date axis and used only to inflate
//! the measurement variance of sources that drift away from it, so sources
//! with historically poorer agreement are down-weighted without per-variable
//! manual tuning.
//!
//! Gaps never interpolate: a day where a source is MISSING simply drops that
//! source from the day's combination, and a day with no usable observation
//! at all is MISSING in the output.

use crate::types::fused::{FusedDay, FusedSeries, FusedValue};
use crate::types::observation::{Flag, SourceId, SourceSeries};
use crate::types::variable::ClimateVariable;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    /// The engine was invoked with zero source series. Missing data is a
    /// normal runtime condition, an empty source map is a bug in the caller.
    #[error("fusion invoked with zero source series")]
    NoSources,
}

/// Fusion tuning knobs.
///
/// `default_variance` is the measurement-variance prior assigned to a source
/// with no history, divided by the source's reliability weight; it is
/// deliberately conservative (sigma of two canonical units) and is
/// configuration, not a hard-coded guess. Variances are not re-estimated
/// online: the dominant error is inter-source bias, not within-source noise.
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// Prior measurement variance for a weight-1.0 source.
    pub default_variance: f64,
    /// Variance added to the running state per day stepped, so stale
    /// estimates lose influence over the drift adjustment.
    pub process_noise: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            default_variance: 4.0,
            process_noise: 1.0,
        }
    }
}

#[derive(Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

/// Running filter state for one variable: (estimate, variance).
type State = Option<(f64, f64)>;

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuses the validated series in `sources` into one series.
    ///
    /// `weights` carries the per-source reliability scores in (0, 1]; a
    /// missing entry defaults to 1.0. All series must describe the same
    /// coordinate and range — they come out of one request's fetch pipeline.
    ///
    /// The combination per day is a symmetric function of its inputs:
    /// supplying the sources in a different order yields an identical
    /// result.
    pub fn fuse(
        &self,
        sources: &HashMap<SourceId, SourceSeries>,
        weights: &HashMap<SourceId, f64>,
    ) -> Result<FusedSeries, FusionError> {
        // Deterministic source order; also what makes fusion independent of
        // the input map's iteration order.
        let ordered: BTreeMap<&SourceId, &SourceSeries> =
            sources.iter().map(|(id, s)| (id, s)).collect();
        let Some(first) = ordered.values().next() else {
            return Err(FusionError::NoSources);
        };
        let coordinate = first.coordinate;
        let range = first.range;

        let variables: BTreeSet<ClimateVariable> = ordered
            .values()
            .flat_map(|series| series.variables())
            .collect();

        let mut columns: BTreeMap<ClimateVariable, Vec<FusedValue>> = BTreeMap::new();
        for &variable in &variables {
            columns.insert(variable, self.fuse_variable(variable, &ordered, weights));
        }

        let days = range
            .iter_days()
            .enumerate()
            .map(|(idx, date)| FusedDay {
                date,
                values: columns
                    .iter()
                    .map(|(&variable, column)| (variable, column[idx]))
                    .collect(),
            })
            .collect();

        debug!(
            "fused {} day(s) x {} variable(s) from {} source(s)",
            range.days(),
            variables.len(),
            ordered.len()
        );

        Ok(FusedSeries {
            coordinate,
            range,
            days,
            sources_used: ordered.keys().map(|&id| id.clone()).collect(),
            failures: BTreeMap::new(),
        })
    }

    /// One sequential filter pass over the date axis for `variable`.
    fn fuse_variable(
        &self,
        variable: ClimateVariable,
        sources: &BTreeMap<&SourceId, &SourceSeries>,
        weights: &HashMap<SourceId, f64>,
    ) -> Vec<FusedValue> {
        let days = sources
            .values()
            .next()
            .map(|s| s.range.days() as usize)
            .unwrap_or(0);

        let mut state: State = None;
        let mut column = Vec::with_capacity(days);

        for idx in 0..days {
            // All VALID observations across sources for this date, in
            // source-id order.
            let measurements: Vec<(f64, f64)> = sources
                .iter()
                .filter_map(|(id, series)| {
                    let obs = series.observations(variable)?.get(idx)?;
                    let value = obs.usable()?;
                    debug_assert_eq!(obs.flag, Flag::Valid);
                    Some((value, self.prior_variance(weights, id)))
                })
                .collect();

            let fused = match measurements.len() {
                0 => {
                    // Time passes for the running estimate even on gap days.
                    if let Some((_, p)) = state.as_mut() {
                        *p += self.config.process_noise;
                    }
                    FusedValue::missing()
                }
                1 => {
                    let (value, variance) = measurements[0];
                    state = Some((value, variance));
                    FusedValue {
                        value: Some(value),
                        variance: Some(variance),
                        source_count: 1,
                        flag: Flag::Valid,
                    }
                }
                n => {
                    let predicted = state.map(|(e, p)| (e, p + self.config.process_noise));
                    let mut weight_sum = 0.0;
                    let mut weighted_value_sum = 0.0;
                    for &(value, variance) in &measurements {
                        let adjusted = drift_adjusted(variance, value, predicted);
                        weight_sum += 1.0 / adjusted;
                        weighted_value_sum += value / adjusted;
                    }
                    let value = weighted_value_sum / weight_sum;
                    let variance = 1.0 / weight_sum;
                    state = Some((value, variance));
                    FusedValue {
                        value: Some(value),
                        variance: Some(variance),
                        source_count: n,
                        flag: Flag::Valid,
                    }
                }
            };
            column.push(fused);
        }
        column
    }

    fn prior_variance(&self, weights: &HashMap<SourceId, f64>, id: &SourceId) -> f64 {
        let weight = weights.get(id).copied().unwrap_or(1.0).max(1e-3);
        self.config.default_variance / weight
    }
}

/// Inflates a source's measurement variance by its squared deviation from
/// the running estimate, normalized by the total spread. No state yet means
/// no adjustment.
fn drift_adjusted(variance: f64, value: f64, predicted: Option<(f64, f64)>) -> f64 {
    match predicted {
        Some((estimate, p)) => {
            let deviation = value - estimate;
            variance * (1.0 + deviation * deviation / (p + variance))
        }
        None => variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::coordinate::Coordinate;
    use crate::types::date_range::DateRange;
    use crate::types::observation::observations_for_range;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(days: i64) -> DateRange {
        DateRange::new(d(2024, 1, 1), d(2024, 1, 1) + chrono::Duration::days(days - 1)).unwrap()
    }

    fn series(source: &str, r: DateRange, temps: &[Option<f64>]) -> SourceSeries {
        let mut s = SourceSeries::new(
            source.into(),
            Coordinate::new(40.71, -74.0).unwrap(),
            r,
        );
        let column = observations_for_range(&r, |date| temps[r.index_of(date).unwrap()]);
        s.insert_variable(ClimateVariable::TempMean, column);
        s
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default())
    }

    #[test]
    fn zero_sources_is_a_contract_violation() {
        let err = engine().fuse(&HashMap::new(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, FusionError::NoSources));
    }

    #[test]
    fn single_source_passes_through_exactly() {
        let r = range(3);
        let mut sources = HashMap::new();
        sources.insert(
            SourceId::from("a"),
            series("a", r, &[Some(20.0), Some(21.5), Some(19.0)]),
        );

        let fused = engine().fuse(&sources, &HashMap::new()).unwrap();
        assert_eq!(fused.len(), 3);
        assert_eq!(fused.days[0].value(ClimateVariable::TempMean), Some(20.0));
        assert_eq!(fused.days[1].value(ClimateVariable::TempMean), Some(21.5));
        assert_eq!(fused.days[2].value(ClimateVariable::TempMean), Some(19.0));
        for day in fused.iter() {
            assert_eq!(day.values[&ClimateVariable::TempMean].source_count, 1);
        }
    }

    #[test]
    fn fusion_is_order_independent() {
        let r = range(5);
        let temps_a = [Some(20.0), Some(21.0), None, Some(18.5), Some(22.0)];
        let temps_b = [Some(20.6), None, Some(19.0), Some(18.0), Some(23.5)];
        let temps_c = [Some(19.4), Some(20.5), Some(19.2), None, Some(21.0)];

        let mut weights = HashMap::new();
        weights.insert(SourceId::from("a"), 0.9);
        weights.insert(SourceId::from("b"), 0.7);
        weights.insert(SourceId::from("c"), 0.8);

        // Same series, two different insertion orders.
        let mut forward = HashMap::new();
        forward.insert(SourceId::from("a"), series("a", r, &temps_a));
        forward.insert(SourceId::from("b"), series("b", r, &temps_b));
        forward.insert(SourceId::from("c"), series("c", r, &temps_c));

        let mut reverse = HashMap::new();
        reverse.insert(SourceId::from("c"), series("c", r, &temps_c));
        reverse.insert(SourceId::from("b"), series("b", r, &temps_b));
        reverse.insert(SourceId::from("a"), series("a", r, &temps_a));

        let x = engine().fuse(&forward, &weights).unwrap();
        let y = engine().fuse(&reverse, &weights).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn two_sources_fuse_between_them_with_reduced_variance() {
        let r = range(1);
        let mut sources = HashMap::new();
        sources.insert(SourceId::from("a"), series("a", r, &[Some(20.0)]));
        sources.insert(SourceId::from("b"), series("b", r, &[Some(22.0)]));

        let fused = engine().fuse(&sources, &HashMap::new()).unwrap();
        let day = &fused.days[0].values[&ClimateVariable::TempMean];
        let value = day.value.unwrap();
        assert!(value > 20.0 && value < 22.0);
        assert_eq!(day.source_count, 2);
        // Two equal-weight measurements halve the variance.
        let prior = FusionConfig::default().default_variance;
        assert!(day.variance.unwrap() < prior);
    }

    #[test]
    fn higher_weight_pulls_the_estimate() {
        let r = range(1);
        let mut sources = HashMap::new();
        sources.insert(SourceId::from("reliable"), series("reliable", r, &[Some(20.0)]));
        sources.insert(SourceId::from("coarse"), series("coarse", r, &[Some(30.0)]));

        let mut weights = HashMap::new();
        weights.insert(SourceId::from("reliable"), 1.0);
        weights.insert(SourceId::from("coarse"), 0.2);

        let fused = engine().fuse(&sources, &weights).unwrap();
        let value = fused.days[0].value(ClimateVariable::TempMean).unwrap();
        assert!(value < 25.0, "estimate should lean toward the reliable source, got {value}");
    }

    #[test]
    fn gap_days_do_not_interpolate() {
        let r = range(3);
        let mut sources = HashMap::new();
        sources.insert(
            SourceId::from("a"),
            series("a", r, &[Some(20.0), None, Some(21.0)]),
        );
        sources.insert(
            SourceId::from("b"),
            series("b", r, &[Some(20.4), None, Some(21.2)]),
        );

        let fused = engine().fuse(&sources, &HashMap::new()).unwrap();
        let middle = &fused.days[1].values[&ClimateVariable::TempMean];
        assert_eq!(middle.value, None);
        assert_eq!(middle.flag, Flag::Missing);
        assert_eq!(middle.source_count, 0);
        // Neighbours are unaffected.
        assert!(fused.days[0].value(ClimateVariable::TempMean).is_some());
        assert!(fused.days[2].value(ClimateVariable::TempMean).is_some());
    }

    #[test]
    fn days_where_one_source_drops_out_fall_back_to_the_other() {
        let r = range(2);
        let mut sources = HashMap::new();
        sources.insert(
            SourceId::from("a"),
            series("a", r, &[Some(20.0), Some(21.0)]),
        );
        sources.insert(SourceId::from("b"), series("b", r, &[Some(24.0), None]));

        let fused = engine().fuse(&sources, &HashMap::new()).unwrap();
        // Day two only has source a; exact passthrough.
        assert_eq!(fused.days[1].value(ClimateVariable::TempMean), Some(21.0));
        assert_eq!(fused.days[1].values[&ClimateVariable::TempMean].source_count, 1);
    }
}
