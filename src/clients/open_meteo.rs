//! Open-Meteo adapters: the historical archive endpoint and the forecast
//! endpoint. Both speak the same daily JSON schema, so the two clients
//! share descriptor variables and normalization.

use crate::clients::error::SourceError;
use crate::clients::http::get_json;
use crate::clients::{SourceClient, WIND_10M_TO_2M};
use crate::types::coordinate::{Coordinate, Coverage};
use crate::types::date_range::DateRange;
use crate::types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
use crate::types::observation::{observations_for_range, SourceId, SourceSeries};
use crate::types::variable::ClimateVariable;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,temperature_2m_mean,\
relative_humidity_2m_mean,wind_speed_10m_mean,shortwave_radiation_sum,precipitation_sum";

fn variables() -> BTreeSet<ClimateVariable> {
    [
        ClimateVariable::TempMax,
        ClimateVariable::TempMin,
        ClimateVariable::TempMean,
        ClimateVariable::RelHumidityMean,
        ClimateVariable::WindSpeedMean,
        ClimateVariable::SolarRadiation,
        ClimateVariable::Precipitation,
    ]
    .into_iter()
    .collect()
}

fn request_url(base: &str, coordinate: Coordinate, range: DateRange) -> String {
    // wind_speed_unit=ms so no speed conversion is needed beyond the
    // 10 m -> 2 m height adjustment; radiation is already MJ/m²/day.
    format!(
        "{base}?latitude={:.4}&longitude={:.4}&start_date={}&end_date={}&daily={DAILY_FIELDS}&wind_speed_unit=ms&timezone=UTC",
        coordinate.lat, coordinate.lon, range.start, range.end
    )
}

#[derive(Debug, Deserialize)]
struct Payload {
    daily: DailyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct DailyBlock {
    time: Vec<NaiveDate>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_mean: Vec<Option<f64>>,
    #[serde(default)]
    shortwave_radiation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
}

fn normalize_payload(
    source: &SourceId,
    raw: &serde_json::Value,
    coordinate: Coordinate,
    range: DateRange,
) -> Result<SourceSeries, SourceError> {
    let payload: Payload =
        serde_json::from_value(raw.clone()).map_err(|e| SourceError::Decode {
            source_id: source.clone(),
            message: e.to_string(),
        })?;

    let daily = payload.daily;
    let index_by_date: HashMap<NaiveDate, usize> = daily
        .time
        .iter()
        .enumerate()
        .map(|(idx, &date)| (date, idx))
        .collect();

    let column = |values: &[Option<f64>], scale: f64| {
        observations_for_range(&range, |date| {
            index_by_date
                .get(&date)
                .and_then(|&idx| values.get(idx).copied().flatten())
                .map(|v| v * scale)
        })
    };

    let mut series = SourceSeries::new(source.clone(), coordinate, range);
    series.insert_variable(ClimateVariable::TempMax, column(&daily.temperature_2m_max, 1.0));
    series.insert_variable(ClimateVariable::TempMin, column(&daily.temperature_2m_min, 1.0));
    series.insert_variable(
        ClimateVariable::TempMean,
        column(&daily.temperature_2m_mean, 1.0),
    );
    series.insert_variable(
        ClimateVariable::RelHumidityMean,
        column(&daily.relative_humidity_2m_mean, 1.0),
    );
    series.insert_variable(
        ClimateVariable::WindSpeedMean,
        column(&daily.wind_speed_10m_mean, WIND_10M_TO_2M),
    );
    series.insert_variable(
        ClimateVariable::SolarRadiation,
        column(&daily.shortwave_radiation_sum, 1.0),
    );
    series.insert_variable(
        ClimateVariable::Precipitation,
        column(&daily.precipitation_sum, 1.0),
    );
    Ok(series)
}

/// Open-Meteo Archive: global daily history from 1990 with a two-day ingest
/// delay.
pub struct OpenMeteoArchive {
    http: Client,
    descriptor: SourceDescriptor,
}

impl OpenMeteoArchive {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            descriptor: SourceDescriptor {
                id: "openmeteo_archive".into(),
                name: "Open-Meteo Archive".to_string(),
                coverage: Coverage::Global,
                window: DateWindow {
                    start: WindowEdge::Fixed(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()),
                    end_offset_days: -2,
                },
                variables: variables(),
                priority: 1,
                reliability: 0.92,
            },
        }
    }
}

impl Default for OpenMeteoArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for OpenMeteoArchive {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<serde_json::Value, SourceError> {
        get_json(&self.http, &request_url(ARCHIVE_URL, coordinate, range)).await
    }

    fn normalize(
        &self,
        raw: &serde_json::Value,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<SourceSeries, SourceError> {
        normalize_payload(&self.descriptor.id, raw, coordinate, range)
    }
}

/// Open-Meteo Forecast: global daily data from thirty days back through a
/// five-day horizon.
pub struct OpenMeteoForecast {
    http: Client,
    descriptor: SourceDescriptor,
}

impl OpenMeteoForecast {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            descriptor: SourceDescriptor {
                id: "openmeteo_forecast".into(),
                name: "Open-Meteo Forecast".to_string(),
                coverage: Coverage::Global,
                window: DateWindow {
                    start: WindowEdge::Offset(-30),
                    end_offset_days: 5,
                },
                variables: variables(),
                priority: 1,
                reliability: 0.85,
            },
        }
    }
}

impl Default for OpenMeteoForecast {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for OpenMeteoForecast {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<serde_json::Value, SourceError> {
        get_json(&self.http, &request_url(FORECAST_URL, coordinate, range)).await
    }

    fn normalize(
        &self,
        raw: &serde_json::Value,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<SourceSeries, SourceError> {
        normalize_payload(&self.descriptor.id, raw, coordinate, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::observation::Flag;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn normalizes_daily_payload() {
        let client = OpenMeteoArchive::new();
        let coordinate = Coordinate::new(40.71, -74.0).unwrap();
        let range = DateRange::new(d(2023, 5, 1), d(2023, 5, 3)).unwrap();

        let raw = json!({
            "daily": {
                "time": ["2023-05-01", "2023-05-02", "2023-05-03"],
                "temperature_2m_max": [21.0, null, 23.5],
                "temperature_2m_min": [11.0, 12.0, 12.5],
                "temperature_2m_mean": [16.0, 16.5, 18.0],
                "relative_humidity_2m_mean": [60.0, 62.0, 55.0],
                "wind_speed_10m_mean": [4.0, 5.0, 3.0],
                "shortwave_radiation_sum": [22.5, 20.0, 24.0],
                "precipitation_sum": [0.0, 1.2, 0.0]
            }
        });

        let series = client.normalize(&raw, coordinate, range).unwrap();
        let tmax = series.observations(ClimateVariable::TempMax).unwrap();
        assert_eq!(tmax[0].usable(), Some(21.0));
        assert_eq!(tmax[1].flag, Flag::Missing);
        assert_eq!(tmax[2].usable(), Some(23.5));

        // 10 m wind comes down to 2 m via the FAO-56 factor.
        let wind = series.observations(ClimateVariable::WindSpeedMean).unwrap();
        assert!((wind[0].usable().unwrap() - 4.0 * WIND_10M_TO_2M).abs() < 1e-9);
    }

    #[test]
    fn dates_absent_from_payload_become_missing() {
        let client = OpenMeteoForecast::new();
        let coordinate = Coordinate::new(40.71, -74.0).unwrap();
        let range = DateRange::new(d(2023, 5, 1), d(2023, 5, 3)).unwrap();

        // Upstream only returned the middle day.
        let raw = json!({
            "daily": {
                "time": ["2023-05-02"],
                "temperature_2m_mean": [16.5]
            }
        });

        let series = client.normalize(&raw, coordinate, range).unwrap();
        let tmean = series.observations(ClimateVariable::TempMean).unwrap();
        assert_eq!(tmean.len(), 3);
        assert_eq!(tmean[0].flag, Flag::Missing);
        assert_eq!(tmean[1].usable(), Some(16.5));
        assert_eq!(tmean[2].flag, Flag::Missing);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let client = OpenMeteoArchive::new();
        let coordinate = Coordinate::new(40.71, -74.0).unwrap();
        let range = DateRange::new(d(2023, 5, 1), d(2023, 5, 1)).unwrap();

        let err = client
            .normalize(&json!({"unexpected": true}), coordinate, range)
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
        assert!(!err.is_transient());
    }
}
