//! MET Norway Locationforecast adapter.
//!
//! The compact endpoint returns an hourly (later 6-hourly) timeseries, so
//! this client aggregates instants into daily values: min/max/mean for
//! temperature, mean for humidity and wind, sum for precipitation.
//! MET Norway rejects anonymous clients, hence the explicit User-Agent.

use crate::clients::error::SourceError;
use crate::clients::http::{get_json, USER_AGENT};
use crate::clients::{SourceClient, WIND_10M_TO_2M};
use crate::types::coordinate::{Coordinate, Coverage};
use crate::types::date_range::DateRange;
use crate::types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
use crate::types::observation::{observations_for_range, SourceSeries};
use crate::types::variable::ClimateVariable;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

const BASE_URL: &str = "https://api.met.no/weatherapi/locationforecast/2.0/compact";

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
struct Payload {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    timeseries: Vec<TimeStep>,
}

#[derive(Debug, Deserialize)]
struct TimeStep {
    time: DateTime<Utc>,
    data: StepData,
}

#[derive(Debug, Deserialize)]
struct StepData {
    instant: Instant,
    #[serde(default)]
    next_1_hours: Option<NextHours>,
}

#[derive(Debug, Deserialize)]
struct Instant {
    details: InstantDetails,
}

#[derive(Debug, Default, Deserialize)]
struct InstantDetails {
    air_temperature: Option<f64>,
    relative_humidity: Option<f64>,
    wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NextHours {
    details: NextHoursDetails,
}

#[derive(Debug, Default, Deserialize)]
struct NextHoursDetails {
    precipitation_amount: Option<f64>,
}

/// Running aggregate for one calendar day of instants.
#[derive(Debug, Default)]
struct DayAggregate {
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    temp_sum: f64,
    temp_count: u32,
    humidity_sum: f64,
    humidity_count: u32,
    wind_sum: f64,
    wind_count: u32,
    precipitation_sum: f64,
    precipitation_count: u32,
}

impl DayAggregate {
    fn push(&mut self, step: &StepData) {
        let details = &step.instant.details;
        if let Some(t) = details.air_temperature {
            self.temp_min = Some(self.temp_min.map_or(t, |m| m.min(t)));
            self.temp_max = Some(self.temp_max.map_or(t, |m| m.max(t)));
            self.temp_sum += t;
            self.temp_count += 1;
        }
        if let Some(rh) = details.relative_humidity {
            self.humidity_sum += rh;
            self.humidity_count += 1;
        }
        if let Some(ws) = details.wind_speed {
            self.wind_sum += ws;
            self.wind_count += 1;
        }
        if let Some(next) = &step.next_1_hours {
            if let Some(p) = next.details.precipitation_amount {
                self.precipitation_sum += p;
                self.precipitation_count += 1;
            }
        }
    }

    fn value(&self, variable: ClimateVariable) -> Option<f64> {
        match variable {
            ClimateVariable::TempMax => self.temp_max,
            ClimateVariable::TempMin => self.temp_min,
            ClimateVariable::TempMean => {
                (self.temp_count > 0).then(|| self.temp_sum / f64::from(self.temp_count))
            }
            ClimateVariable::RelHumidityMean => {
                (self.humidity_count > 0).then(|| self.humidity_sum / f64::from(self.humidity_count))
            }
            ClimateVariable::WindSpeedMean => (self.wind_count > 0)
                .then(|| self.wind_sum / f64::from(self.wind_count) * WIND_10M_TO_2M),
            ClimateVariable::Precipitation => {
                (self.precipitation_count > 0).then_some(self.precipitation_sum)
            }
            _ => None,
        }
    }
}

pub struct MetNorway {
    http: Client,
    descriptor: SourceDescriptor,
}

impl MetNorway {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            descriptor: SourceDescriptor {
                id: "met_norway".into(),
                name: "MET Norway Locationforecast".to_string(),
                coverage: Coverage::Global,
                window: DateWindow {
                    start: WindowEdge::Offset(0),
                    end_offset_days: 5,
                },
                variables: variables(),
                priority: 4,
                reliability: 0.75,
            },
        }
    }
}

impl Default for MetNorway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for MetNorway {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        _range: DateRange,
    ) -> Result<serde_json::Value, SourceError> {
        // The endpoint takes no date parameters; it always returns the full
        // forecast horizon and normalization slices out the requested range.
        let url = format!(
            "{BASE_URL}?lat={:.4}&lon={:.4}",
            coordinate.lat, coordinate.lon
        );
        get_json(&self.http, &url).await
    }

    fn normalize(
        &self,
        raw: &serde_json::Value,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<SourceSeries, SourceError> {
        let payload: Payload =
            serde_json::from_value(raw.clone()).map_err(|e| SourceError::Decode {
                source_id: self.descriptor.id.clone(),
                message: e.to_string(),
            })?;

        let mut by_date: BTreeMap<NaiveDate, DayAggregate> = BTreeMap::new();
        for step in &payload.properties.timeseries {
            by_date
                .entry(step.time.date_naive())
                .or_default()
                .push(&step.data);
        }

        let mut series = SourceSeries::new(self.descriptor.id.clone(), coordinate, range);
        for variable in variables() {
            let observations = observations_for_range(&range, |date| {
                by_date.get(&date).and_then(|agg| agg.value(variable))
            });
            series.insert_variable(variable, observations);
        }
        Ok(series)
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

    fn step(time: &str, temp: f64, rh: f64, wind: f64, precip: Option<f64>) -> serde_json::Value {
        let mut data = json!({
            "instant": {
                "details": {
                    "air_temperature": temp,
                    "relative_humidity": rh,
                    "wind_speed": wind
                }
            }
        });
        if let Some(p) = precip {
            data["next_1_hours"] = json!({ "details": { "precipitation_amount": p } });
        }
        json!({ "time": time, "data": data })
    }

    #[test]
    fn aggregates_hourly_steps_into_daily_values() {
        let client = MetNorway::new();
        let coordinate = Coordinate::new(59.91, 10.75).unwrap();
        let range = DateRange::new(d(2024, 6, 1), d(2024, 6, 2)).unwrap();

        let raw = json!({
            "properties": {
                "timeseries": [
                    step("2024-06-01T00:00:00Z", 10.0, 80.0, 2.0, Some(0.0)),
                    step("2024-06-01T12:00:00Z", 18.0, 60.0, 4.0, Some(1.5)),
                    step("2024-06-02T12:00:00Z", 20.0, 55.0, 3.0, None)
                ]
            }
        });

        let series = client.normalize(&raw, coordinate, range).unwrap();

        let tmax = series.observations(ClimateVariable::TempMax).unwrap();
        let tmin = series.observations(ClimateVariable::TempMin).unwrap();
        let tmean = series.observations(ClimateVariable::TempMean).unwrap();
        assert_eq!(tmax[0].usable(), Some(18.0));
        assert_eq!(tmin[0].usable(), Some(10.0));
        assert_eq!(tmean[0].usable(), Some(14.0));

        let precip = series.observations(ClimateVariable::Precipitation).unwrap();
        assert_eq!(precip[0].usable(), Some(1.5));
        // No next_1_hours block on day two means no precipitation total.
        assert_eq!(precip[1].flag, Flag::Missing);

        let wind = series.observations(ClimateVariable::WindSpeedMean).unwrap();
        assert!((wind[0].usable().unwrap() - 3.0 * WIND_10M_TO_2M).abs() < 1e-9);
    }

    #[test]
    fn days_outside_the_forecast_are_missing() {
        let client = MetNorway::new();
        let coordinate = Coordinate::new(59.91, 10.75).unwrap();
        let range = DateRange::new(d(2024, 6, 1), d(2024, 6, 3)).unwrap();

        let raw = json!({
            "properties": {
                "timeseries": [
                    step("2024-06-01T06:00:00Z", 12.0, 70.0, 2.5, Some(0.2))
                ]
            }
        });

        let series = client.normalize(&raw, coordinate, range).unwrap();
        let tmean = series.observations(ClimateVariable::TempMean).unwrap();
        assert_eq!(tmean[0].usable(), Some(12.0));
        assert_eq!(tmean[1].flag, Flag::Missing);
        assert_eq!(tmean[2].flag, Flag::Missing);
    }
}
