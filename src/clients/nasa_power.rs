//! NASA POWER adapter: agroclimatology daily point data back to 1981.
//!
//! POWER keys its values by `YYYYMMDD` date strings and marks gaps with a
//! -999 fill value rather than null, so normalization filters those out.

use crate::clients::error::SourceError;
use crate::clients::http::get_json;
use crate::clients::SourceClient;
use crate::types::coordinate::{Coordinate, Coverage};
use crate::types::date_range::DateRange;
use crate::types::descriptor::{DateWindow, SourceDescriptor, WindowEdge};
use crate::types::observation::{observations_for_range, SourceSeries};
use crate::types::variable::ClimateVariable;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

const BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

/// POWER's documented fill value for absent observations.
const FILL_VALUE: f64 = -999.0;

const PARAMETERS: &str = "T2M_MAX,T2M_MIN,T2M,RH2M,WS2M,ALLSKY_SFC_SW_DWN,PRECTOTCORR";

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

#[derive(Debug, Deserialize)]
struct Payload {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    parameter: HashMap<String, HashMap<String, f64>>,
}

pub struct NasaPower {
    http: Client,
    descriptor: SourceDescriptor,
}

impl NasaPower {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            descriptor: SourceDescriptor {
                id: "nasa_power".into(),
                name: "NASA POWER".to_string(),
                coverage: Coverage::Global,
                window: DateWindow {
                    start: WindowEdge::Fixed(NaiveDate::from_ymd_opt(1981, 1, 1).unwrap()),
                    end_offset_days: 0,
                },
                variables: variables(),
                priority: 2,
                reliability: 0.85,
            },
        }
    }

    fn request_url(&self, coordinate: Coordinate, range: DateRange) -> String {
        format!(
            "{BASE_URL}?parameters={PARAMETERS}&community=ag&latitude={:.4}&longitude={:.4}&start={}&end={}&format=json",
            coordinate.lat,
            coordinate.lon,
            range.start.format("%Y%m%d"),
            range.end.format("%Y%m%d"),
        )
    }
}

impl Default for NasaPower {
    fn default() -> Self {
        Self::new()
    }
}

/// Which POWER parameter feeds each canonical variable. WS2M is already at
/// 2 m and in m/s; ALLSKY_SFC_SW_DWN is MJ/m²/day for the ag community.
const PARAMETER_MAP: [(&str, ClimateVariable); 7] = [
    ("T2M_MAX", ClimateVariable::TempMax),
    ("T2M_MIN", ClimateVariable::TempMin),
    ("T2M", ClimateVariable::TempMean),
    ("RH2M", ClimateVariable::RelHumidityMean),
    ("WS2M", ClimateVariable::WindSpeedMean),
    ("ALLSKY_SFC_SW_DWN", ClimateVariable::SolarRadiation),
    ("PRECTOTCORR", ClimateVariable::Precipitation),
];

#[async_trait]
impl SourceClient for NasaPower {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_raw(
        &self,
        coordinate: Coordinate,
        range: DateRange,
    ) -> Result<serde_json::Value, SourceError> {
        get_json(&self.http, &self.request_url(coordinate, range)).await
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

        let mut series = SourceSeries::new(self.descriptor.id.clone(), coordinate, range);
        for (parameter, variable) in PARAMETER_MAP {
            let by_date = payload.properties.parameter.get(parameter);
            let observations = observations_for_range(&range, |date| {
                by_date
                    .and_then(|values| values.get(&date.format("%Y%m%d").to_string()))
                    .copied()
                    .filter(|v| *v != FILL_VALUE)
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

    #[test]
    fn normalizes_keyed_dates_and_fill_values() {
        let client = NasaPower::new();
        let coordinate = Coordinate::new(9.03, 38.74).unwrap();
        let range = DateRange::new(d(2022, 7, 1), d(2022, 7, 3)).unwrap();

        let raw = json!({
            "properties": {
                "parameter": {
                    "T2M_MAX": {
                        "20220701": 24.1,
                        "20220702": -999.0,
                        "20220703": 23.0
                    },
                    "PRECTOTCORR": {
                        "20220701": 5.4,
                        "20220702": 12.0,
                        "20220703": 0.0
                    }
                }
            }
        });

        let series = client.normalize(&raw, coordinate, range).unwrap();

        let tmax = series.observations(ClimateVariable::TempMax).unwrap();
        assert_eq!(tmax[0].usable(), Some(24.1));
        assert_eq!(tmax[1].flag, Flag::Missing);
        assert_eq!(tmax[2].usable(), Some(23.0));

        // Parameters absent from the payload come back as all-missing
        // columns rather than an error.
        let wind = series.observations(ClimateVariable::WindSpeedMean).unwrap();
        assert!(wind.iter().all(|obs| obs.flag == Flag::Missing));
    }

    #[test]
    fn url_uses_compact_dates() {
        let client = NasaPower::new();
        let coordinate = Coordinate::new(9.03, 38.74).unwrap();
        let range = DateRange::new(d(2022, 7, 1), d(2022, 7, 3)).unwrap();

        let url = client.request_url(coordinate, range);
        assert!(url.contains("start=20220701"));
        assert!(url.contains("end=20220703"));
        assert!(url.contains("community=ag"));
    }
}
