//! US National Weather Service adapter.
//!
//! NWS is a two-step API: `/points/{lat},{lon}` resolves the coordinate to
//! a forecast office grid, whose `forecastGridData` URL then serves the
//! actual numeric forecast. Grid values carry ISO-8601 validity intervals
//! and per-field units, so normalization groups intervals by calendar day
//! and converts units as declared.

use crate::clients::error::SourceError;
use crate::clients::http::{get_json, USER_AGENT};
use crate::clients::{SourceClient, WIND_10M_TO_2M};
use crate::types::coordinate::{BoundingBox, Coordinate, Coverage};
use crate::types::date_range::DateRange;
use crate::types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
use crate::types::observation::{observations_for_range, SourceSeries};
use crate::types::variable::ClimateVariable;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

const POINTS_URL: &str = "https://api.weather.gov/points";

fn variables() -> BTreeSet<ClimateVariable> {
    [
        ClimateVariable::TempMax,
        ClimateVariable::TempMin,
        ClimateVariable::TempMean,
        ClimateVariable::RelHumidityMean,
        ClimateVariable::WindSpeedMean,
        ClimateVariable::Precipitation,
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Deserialize)]
struct GridPayload {
    properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    temperature: Option<GridField>,
    #[serde(default)]
    max_temperature: Option<GridField>,
    #[serde(default)]
    min_temperature: Option<GridField>,
    #[serde(default)]
    relative_humidity: Option<GridField>,
    #[serde(default)]
    wind_speed: Option<GridField>,
    #[serde(default)]
    quantitative_precipitation: Option<GridField>,
}

#[derive(Debug, Default, Deserialize)]
struct GridField {
    #[serde(default)]
    uom: Option<String>,
    #[serde(default)]
    values: Vec<GridValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridValue {
    /// ISO-8601 interval, e.g. `2024-06-01T06:00:00+00:00/PT6H`. Only the
    /// leading date is needed for daily grouping.
    valid_time: String,
    value: Option<f64>,
}

/// How a day's interval values collapse into one daily number.
#[derive(Clone, Copy)]
enum Reduce {
    Min,
    Max,
    Mean,
    Sum,
}

fn convert(value: f64, uom: Option<&str>) -> f64 {
    match uom {
        Some("wmoUnit:degF") | Some("F") => (value - 32.0) * 5.0 / 9.0,
        Some("wmoUnit:km_h-1") => value / 3.6,
        _ => value,
    }
}

fn daily_values(field: &GridField) -> BTreeMap<NaiveDate, Vec<f64>> {
    let uom = field.uom.as_deref();
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for entry in &field.values {
        let Some(value) = entry.value else { continue };
        let Some(date) = entry
            .valid_time
            .get(..10)
            .and_then(|s| s.parse::<NaiveDate>().ok())
        else {
            continue;
        };
        by_date.entry(date).or_default().push(convert(value, uom));
    }
    by_date
}

fn reduce(values: &[f64], how: Reduce) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(match how {
        Reduce::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Reduce::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Reduce::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Reduce::Sum => values.iter().sum(),
    })
}

pub struct NwsForecast {
    http: Client,
    descriptor: SourceDescriptor,
}

impl NwsForecast {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            descriptor: SourceDescriptor {
                id: "nws_forecast".into(),
                name: "NWS Forecast Grid".to_string(),
                // Contiguous United States only.
                coverage: Coverage::Bounded(BoundingBox::new(-125.0, 24.0, -66.0, 49.0)),
                window: DateWindow {
                    start: WindowEdge::Offset(0),
                    end_offset_days: 5,
                },
                variables: variables(),
                priority: 3,
                reliability: 0.8,
            },
        }
    }
}

impl Default for NwsForecast {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for NwsForecast {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        _range: DateRange,
    ) -> Result<serde_json::Value, SourceError> {
        let points_url = format!(
            "{POINTS_URL}/{:.4},{:.4}",
            coordinate.lat, coordinate.lon
        );
        let points = get_json(&self.http, &points_url).await?;

        let grid_url = points
            .pointer("/properties/forecastGridData")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::MissingField {
                source_id: self.descriptor.id.clone(),
                field: "properties.forecastGridData".to_string(),
            })?;

        get_json(&self.http, grid_url).await
    }

    fn normalize(
        &self,
        raw: &serde_json::Value,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<SourceSeries, SourceError> {
        let payload: GridPayload =
            serde_json::from_value(raw.clone()).map_err(|e| SourceError::Decode {
                source_id: self.descriptor.id.clone(),
                message: e.to_string(),
            })?;

        let props = payload.properties;
        let fields: [(Option<&GridField>, ClimateVariable, Reduce, f64); 6] = [
            (props.max_temperature.as_ref(), ClimateVariable::TempMax, Reduce::Max, 1.0),
            (props.min_temperature.as_ref(), ClimateVariable::TempMin, Reduce::Min, 1.0),
            (props.temperature.as_ref(), ClimateVariable::TempMean, Reduce::Mean, 1.0),
            (
                props.relative_humidity.as_ref(),
                ClimateVariable::RelHumidityMean,
                Reduce::Mean,
                1.0,
            ),
            // Grid wind is at 10 m; scale down to 2 m after unit conversion.
            (
                props.wind_speed.as_ref(),
                ClimateVariable::WindSpeedMean,
                Reduce::Mean,
                WIND_10M_TO_2M,
            ),
            (
                props.quantitative_precipitation.as_ref(),
                ClimateVariable::Precipitation,
                Reduce::Sum,
                1.0,
            ),
        ];

        let mut series = SourceSeries::new(self.descriptor.id.clone(), coordinate, range);
        for (field, variable, how, scale) in fields {
            let by_date = field.map(daily_values).unwrap_or_default();
            let observations = observations_for_range(&range, |date| {
                by_date
                    .get(&date)
                    .and_then(|values| reduce(values, how))
                    .map(|v| v * scale)
            });
            series.insert_variable(variable, observations);
        }
        Ok(series)
    }
}
