//! CheckWX METAR API client
//!
//! This module fetches decoded METAR reports from the CheckWX API
//! (<https://www.checkwxapi.com/>) and pulls the observation out of its
//! `{"data": [...]}` envelope.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Base URL for the CheckWX METAR endpoint
const CHECKWX_BASE_URL: &str = "https://api.checkwx.com/metar";

/// Request timeout for the CheckWX API
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("CheckWX request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The response parsed but did not contain what we expected
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// Anything that can fetch raw METAR responses for an airport
pub trait WeatherFetcher {
    /// Fetches the raw response body for `icao` using `api_key`
    fn fetch_weather(
        &self,
        icao: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, WeatherError>> + Send;
}

/// Client for the CheckWX decoded METAR endpoint
#[derive(Debug, Clone)]
pub struct CheckWxClient {
    client: Client,
    base_url: String,
}

impl Default for CheckWxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckWxClient {
    /// Create a new CheckWxClient with default settings
    ///
    /// If the HTTP client cannot be configured, a plain client without the
    /// request timeout is used and a warning is logged. Use [`Self::try_new`]
    /// to get the error instead.
    pub fn new() -> Self {
        Self::try_new().unwrap_or_else(|e| {
            warn!(error = %e, "building CheckWX client failed, requests will have no timeout");
            Self::with_client(Client::new())
        })
    }

    /// Create a new CheckWxClient with the 10 second request timeout
    pub fn try_new() -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client))
    }

    /// Create a new CheckWxClient with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: CHECKWX_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl WeatherFetcher for CheckWxClient {
    /// The body is returned whatever the HTTP status, since CheckWX reports bad
    /// keys in the body and the caller decides what that means.
    async fn fetch_weather(&self, icao: &str, api_key: &str) -> Result<String, WeatherError> {
        let url = format!("{}/{}/decoded", self.base_url, icao);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", api_key)
            .send()
            .await?;

        Ok(response.text().await?)
    }
}

/// Whether a raw response is CheckWX rejecting the API key
pub fn is_unauthorized(response: &str) -> bool {
    response.to_lowercase().contains("unauthorized")
}

/// CheckWX response envelope
#[derive(Debug, Deserialize)]
struct CheckWxResponse {
    data: Vec<Value>,
}

/// Pulls the first observation out of a CheckWX response body
///
/// # Returns
/// * `Ok(Some(Observation))` - the first report in `data`
/// * `Ok(None)` - the station has no current report (`data` is empty)
/// * `Err(WeatherError)` - the body is not a CheckWX envelope of decoded reports
pub fn parse_checkwx_response(body: &str) -> Result<Option<Observation>, WeatherError> {
    let response: CheckWxResponse = serde_json::from_str(body)?;

    match response.data.into_iter().next() {
        None => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(Observation::new(value))),
        Some(other) => Err(WeatherError::UnexpectedShape(format!(
            "expected a decoded report object, got {}",
            other
        ))),
    }
}

/// A weather observation as returned by CheckWX
///
/// Kept as raw JSON so nothing the API sends is lost on its way through the
/// cache. Use [`Observation::decode`] for a typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(Value);

impl Observation {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON payload
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    /// ICAO code of the reporting station
    pub fn icao(&self) -> Option<&str> {
        self.0.get("icao").and_then(Value::as_str)
    }

    /// The raw `observed` timestamp string
    pub fn observed(&self) -> Option<&str> {
        self.0.get("observed").and_then(Value::as_str)
    }

    /// Parsed observation time, once the timestamp carries its UTC marker
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        let observed = self.observed()?;
        DateTime::parse_from_rfc3339(observed)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Marks the `observed` timestamp as UTC
    ///
    /// CheckWX reports observation times in UTC without a zone designator.
    pub fn mark_observed_utc(&mut self) {
        if let Some(Value::String(observed)) = self.0.get_mut("observed") {
            if !observed.ends_with('Z') {
                observed.push('Z');
            }
        }
    }

    /// Decodes the observation into a typed METAR report
    pub fn decode(&self) -> Result<Metar, WeatherError> {
        Ok(Metar::deserialize(&self.0)?)
    }
}

/// Barometric pressure in several units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barometer {
    pub hg: f64,
    pub hpa: f64,
    pub kpa: f64,
    pub mb: f64,
}

/// A single cloud layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudLayer {
    pub code: String,
    pub text: Option<String>,
    pub base_feet_agl: Option<f64>,
    pub base_meters_agl: Option<f64>,
    pub feet: Option<f64>,
    pub meters: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Height {
    pub feet: f64,
    pub meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub celsius: f64,
    pub fahrenheit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Humidity {
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub miles: Option<String>,
    pub miles_float: Option<f64>,
    pub miles_text: Option<String>,
    pub meters: Option<String>,
    pub meters_float: Option<f64>,
    pub meters_text: Option<String>,
}

/// Wind direction, speed and gusts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub degrees: Option<f64>,
    pub speed_kph: f64,
    pub speed_kts: f64,
    pub speed_mph: f64,
    pub speed_mps: f64,
    pub gust_kph: Option<f64>,
    pub gust_kts: Option<f64>,
    pub gust_mph: Option<f64>,
    pub gust_mps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    pub inches: f64,
    pub millimeters: f64,
}

/// Typed view of a decoded CheckWX METAR report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metar {
    pub icao: String,
    pub observed: String,
    pub raw_text: String,
    pub flight_category: Option<String>,
    pub barometer: Option<Barometer>,
    #[serde(default)]
    pub clouds: Vec<CloudLayer>,
    pub ceiling: Option<Height>,
    pub dewpoint: Option<Temperature>,
    pub elevation: Option<Height>,
    pub humidity: Option<Humidity>,
    pub temperature: Option<Temperature>,
    pub visibility: Option<Visibility>,
    pub wind: Option<Wind>,
    pub rain: Option<Precipitation>,
    pub snow: Option<Precipitation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_uses_checkwx_endpoint() {
        let client = CheckWxClient::try_new().expect("Client should build");
        assert_eq!(client.base_url, CHECKWX_BASE_URL);

        let custom = client.with_base_url("http://localhost:9999/metar");
        assert_eq!(custom.base_url, "http://localhost:9999/metar");
    }

    /// Sample decoded CheckWX response
    const VALID_RESPONSE: &str = r#"{
        "results": 1,
        "data": [
            {
                "icao": "EGLL",
                "observed": "2025-01-05T14:50:00",
                "raw_text": "EGLL 051450Z AUTO 24012KT 9999 BKN032 08/04 Q1012",
                "flight_category": "VFR",
                "barometer": {"hg": 29.88, "hpa": 1012.0, "kpa": 101.2, "mb": 1012.0},
                "clouds": [
                    {"code": "BKN", "text": "Broken", "base_feet_agl": 3200, "base_meters_agl": 975.4, "feet": 3200, "meters": 975.4}
                ],
                "ceiling": {"feet": 3200, "meters": 975.4},
                "dewpoint": {"celsius": 4, "fahrenheit": 39.2},
                "elevation": {"feet": 82, "meters": 25},
                "humidity": {"percent": 76},
                "temperature": {"celsius": 8, "fahrenheit": 46.4},
                "visibility": {"miles": "Greater than 6", "miles_float": 6.21, "meters": "10,000+", "meters_float": 10000},
                "wind": {"degrees": 240, "speed_kph": 22, "speed_kts": 12, "speed_mph": 14, "speed_mps": 6}
            }
        ]
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let obs = parse_checkwx_response(VALID_RESPONSE)
            .expect("Failed to parse valid response")
            .expect("Observation should be present");

        assert_eq!(obs.icao(), Some("EGLL"));
        assert_eq!(obs.observed(), Some("2025-01-05T14:50:00"));
    }

    #[test]
    fn test_parse_empty_data_is_none() {
        let result = parse_checkwx_response(r#"{"results": 0, "data": []}"#).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_missing_envelope_is_error() {
        let result = parse_checkwx_response(r#"{"error": "something"}"#);
        assert!(matches!(result, Err(WeatherError::ParseError(_))));
    }

    #[test]
    fn test_parse_undecoded_report_is_error() {
        let result = parse_checkwx_response(r#"{"data": ["EGLL 051450Z 24012KT"]}"#);
        assert!(matches!(result, Err(WeatherError::UnexpectedShape(_))));
    }

    #[test]
    fn test_parse_non_json_is_error() {
        assert!(parse_checkwx_response("<html>Bad gateway</html>").is_err());
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(is_unauthorized(r#"{"error": "Unauthorized"}"#));
        assert!(is_unauthorized("UNAUTHORIZED"));
        assert!(!is_unauthorized(VALID_RESPONSE));
    }

    #[test]
    fn test_mark_observed_utc_appends_once() {
        let mut obs = parse_checkwx_response(VALID_RESPONSE).unwrap().unwrap();

        obs.mark_observed_utc();
        obs.mark_observed_utc();

        assert_eq!(obs.observed(), Some("2025-01-05T14:50:00Z"));
        let at = obs.observed_at().expect("Timestamp should parse");
        assert_eq!(at.to_rfc3339(), "2025-01-05T14:50:00+00:00");
    }

    #[test]
    fn test_observed_at_requires_zone() {
        let obs = parse_checkwx_response(VALID_RESPONSE).unwrap().unwrap();
        assert!(obs.observed_at().is_none());
    }

    #[test]
    fn test_mark_observed_utc_without_timestamp() {
        let mut obs = Observation::new(serde_json::json!({"icao": "KJFK"}));
        obs.mark_observed_utc();
        assert_eq!(obs.as_json(), &serde_json::json!({"icao": "KJFK"}));
    }

    #[test]
    fn test_decode_typed_metar() {
        let obs = parse_checkwx_response(VALID_RESPONSE).unwrap().unwrap();

        let metar = obs.decode().expect("Should decode");

        assert_eq!(metar.icao, "EGLL");
        assert_eq!(metar.flight_category.as_deref(), Some("VFR"));
        assert_eq!(metar.clouds.len(), 1);
        assert_eq!(metar.clouds[0].code, "BKN");
        let wind = metar.wind.expect("Wind should be present");
        assert!((wind.speed_kts - 12.0).abs() < 0.01);
        assert!(wind.gust_kts.is_none());
        assert!(metar.rain.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_required_fields() {
        let obs = Observation::new(serde_json::json!({"icao": "EGLL"}));
        assert!(obs.decode().is_err());
    }

    #[test]
    fn test_observation_serializes_transparently() {
        let obs = Observation::new(serde_json::json!({"icao": "EGLL"}));
        assert_eq!(serde_json::to_string(&obs).unwrap(), r#"{"icao":"EGLL"}"#);
    }

    #[test]
    fn test_client_base_url_override() {
        let client = CheckWxClient::new().with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
