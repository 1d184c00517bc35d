//! Forecast fetching against the Open-Meteo `/v1/forecast` endpoint.

use async_trait::async_trait;
use breeze_core::{TemperatureUnit, WeatherConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::retry::{with_retry, RetryConfig};
use crate::types::{Coordinates, WeatherError, WeatherResponse};

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,wind_direction_10m";
const HOURLY_FIELDS: &str = "temperature_2m,weather_code,relative_humidity_2m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,uv_index_max";

/// Anything that can produce a forecast for a coordinate.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherResponse, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Arc<Client>,
    base_url: String,
    forecast_days: u8,
    unit: TemperatureUnit,
    retry: RetryConfig,
}

impl OpenMeteoProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            forecast_days: config.forecast_days,
            unit: config.temperature_unit,
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl WeatherFetcher for OpenMeteoProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherResponse, WeatherError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let forecast_days = self.forecast_days.to_string();
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let query = [
            ("latitude", latitude.as_str()),
            ("longitude", longitude.as_str()),
            ("current", CURRENT_FIELDS),
            ("hourly", HOURLY_FIELDS),
            ("daily", DAILY_FIELDS),
            ("timezone", "auto"),
            ("forecast_days", forecast_days.as_str()),
            ("temperature_unit", self.unit.as_query_value()),
        ];

        let response = with_retry(&self.retry, || self.client.get(&url).query(&query).send())
            .await
            .map_err(WeatherError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Forecast request failed with status {}", status);
            return Err(WeatherError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(WeatherError::from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| WeatherError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenMeteoProvider {
        let config = WeatherConfig {
            api_base_url: server.uri(),
            ..WeatherConfig::default()
        };
        OpenMeteoProvider::new(&config)
            .unwrap()
            .with_retry(RetryConfig::none())
    }

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "latitude": 41.9,
            "longitude": 12.5,
            "timezone": "Europe/Rome",
            "current": {
                "time": "2026-02-12T10:00",
                "temperature_2m": 18.4,
                "relative_humidity_2m": 60,
                "apparent_temperature": 17.9,
                "weather_code": 1,
                "wind_speed_10m": 12.0,
                "wind_direction_10m": 180
            },
            "hourly": {
                "time": ["2026-02-12T00:00", "2026-02-12T01:00"],
                "temperature_2m": [11.0, 10.5],
                "weather_code": [1, 2],
                "relative_humidity_2m": [70, 72]
            },
            "daily": {
                "time": ["2026-02-12"],
                "weather_code": [1],
                "temperature_2m_max": [19.0],
                "temperature_2m_min": [9.0],
                "uv_index_max": [3.2]
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "41.9"))
            .and(query_param("longitude", "12.5"))
            .and(query_param("timezone", "auto"))
            .and(query_param("forecast_days", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let resp = provider.fetch(Coordinates::new(41.9, 12.5)).await.unwrap();

        assert_eq!(resp.current.temperature, 18.4);
        assert_eq!(resp.hourly.time.len(), 2);
        assert_eq!(resp.daily.uv_index_max, vec![3.2]);
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"current\": 42"))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.fetch(Coordinates::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.fetch(Coordinates::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(forecast_body())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = WeatherConfig {
            api_base_url: server.uri(),
            request_timeout_secs: 1,
            ..WeatherConfig::default()
        };
        let provider = OpenMeteoProvider::new(&config)
            .unwrap()
            .with_retry(RetryConfig::none());

        let err = provider.fetch(Coordinates::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Timeout));
    }
}
