use std::cell::RefCell;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::{Observation, SeriesMetadata};

/// Production endpoint of the FRED REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// FRED reports gaps in a series with a literal dot instead of a number.
const MISSING_VALUE: &str = ".";

/// Remote source of series metadata and observations.
///
/// The pipeline only talks to this seam; tests substitute their own
/// implementation.
pub trait SeriesProvider {
    /// Fetches descriptive metadata for a series. Fails with a provider error
    /// on any transport or decode problem.
    fn series_metadata(&self, code: &str) -> Result<SeriesMetadata>;

    /// Fetches observations for a series, optionally bounded by an inclusive
    /// [start, end] window. An unset bound leaves that side open.
    fn observations(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Observation>>;
}

impl<P: SeriesProvider + ?Sized> SeriesProvider for &P {
    fn series_metadata(&self, code: &str) -> Result<SeriesMetadata> {
        (**self).series_metadata(code)
    }

    fn observations(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Observation>> {
        (**self).observations(code, start, end)
    }
}

/// Blocking HTTP client for the FRED API.
///
/// Requests are paced to stay under the configured per-minute budget; the
/// pipeline is strictly sequential so a minimum interval between consecutive
/// requests is all the throttling required.
pub struct FredClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    min_interval: Duration,
    last_request: RefCell<Option<Instant>>,
}

impl FredClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, requests_per_minute)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_minute: u32,
    ) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(requests_per_minute))
        };

        Self {
            http: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            min_interval,
            last_request: RefCell::new(None),
        }
    }

    fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last_request = self.last_request.borrow_mut();
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last_request = Some(Instant::now());
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        code: &str,
        path: &str,
        extra_query: &[(&str, String)],
    ) -> Result<T> {
        self.pace();

        let url = format!("{}/{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = vec![
            ("series_id", code.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
        ];
        query.extend(extra_query.iter().cloned());

        debug!(code, path, "requesting FRED endpoint");
        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .map_err(|error| SyncError::provider(code, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| {
                    value
                        .get("error_message")
                        .and_then(|message| message.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(SyncError::provider(code, message));
        }

        response
            .json::<T>()
            .map_err(|error| SyncError::provider(code, error))
    }
}

impl SeriesProvider for FredClient {
    fn series_metadata(&self, code: &str) -> Result<SeriesMetadata> {
        let response: SeriesResponse = self.get_json(code, "series", &[])?;
        let info = response.seriess.into_iter().next().unwrap_or_default();

        Ok(SeriesMetadata {
            description: info.description,
            frequency: info.frequency,
            units: info.units,
            seasonal_adjustment: info.seasonal_adjustment,
            last_updated: NaiveDateTime::parse_from_str(&info.last_updated, TIMESTAMP_FORMAT).ok(),
        })
    }

    fn observations(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Observation>> {
        let mut extra_query = Vec::new();
        if let Some(start) = start {
            extra_query.push((
                "observation_start",
                start.format(DATE_FORMAT).to_string(),
            ));
        }
        if let Some(end) = end {
            extra_query.push(("observation_end", end.format(DATE_FORMAT).to_string()));
        }

        let response: ObservationsResponse =
            self.get_json(code, "series/observations", &extra_query)?;

        let mut observations = Vec::with_capacity(response.observations.len());
        for record in response.observations {
            if record.value == MISSING_VALUE {
                continue;
            }
            let date = NaiveDate::parse_from_str(&record.date, DATE_FORMAT)
                .map_err(|error| SyncError::provider(code, error))?;
            let value: f64 = record
                .value
                .parse()
                .map_err(|error| SyncError::provider(code, error))?;
            observations.push(Observation { date, value });
        }
        Ok(observations)
    }
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    seriess: Vec<SeriesInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesInfo {
    #[serde(default)]
    description: String,
    #[serde(default)]
    frequency: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    seasonal_adjustment: String,
    #[serde(default)]
    last_updated: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<ObservationRecord>,
}

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    date: String,
    value: String,
}
