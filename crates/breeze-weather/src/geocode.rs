//! Forward geocoding (Open-Meteo) for search, and reverse geocoding
//! (Nominatim / OpenStreetMap) for naming a device fix.

use async_trait::async_trait;
use breeze_core::{LocationConfig, SearchConfig, WeatherConfig};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::retry::{with_retry, RetryConfig};
use crate::types::{Coordinates, GeocodingResponse, GeocodingResult, LocationError, WeatherError};

const REVERSE_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Breeze/0.1.0 (weather client)";

/// Name search against a geocoding service.
///
/// No matches is an empty list, never an error.
#[async_trait]
pub trait GeocodingFetcher: Send + Sync {
    async fn search(&self, name: &str) -> Result<Vec<GeocodingResult>, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: Client,
    base_url: String,
    count: u32,
    language: String,
    retry: RetryConfig,
}

impl OpenMeteoGeocoder {
    pub fn new(weather: &WeatherConfig, search: &SearchConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(weather.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: weather.geocoding_base_url.trim_end_matches('/').to_string(),
            count: search.result_count,
            language: search.language.clone(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl GeocodingFetcher for OpenMeteoGeocoder {
    #[instrument(skip(self), level = "debug")]
    async fn search(&self, name: &str) -> Result<Vec<GeocodingResult>, WeatherError> {
        let url = format!("{}/v1/search", self.base_url);
        let count = self.count.to_string();
        let query = [
            ("name", name),
            ("count", count.as_str()),
            ("language", self.language.as_str()),
            ("format", "json"),
        ];

        let response = with_retry(&self.retry, || self.client.get(&url).query(&query).send())
            .await
            .map_err(WeatherError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(WeatherError::from_reqwest)?;
        let envelope: GeocodingResponse =
            serde_json::from_str(&body).map_err(|e| WeatherError::Decode(e.to_string()))?;

        let results = envelope.results.unwrap_or_default();
        tracing::debug!("Geocoding '{}' returned {} candidates", name, results.len());
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// Place name with state/country suffix for disambiguation (e.g. "Seattle, Washington")
    fn display_name(self) -> Option<String> {
        let state = self.state.clone();
        let country = self.country.clone();

        // city > town > village > municipality for the primary place name
        let place = self
            .city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.state_district)
            .or(self.county)
            .or(self.state)
            .or(self.country)?;

        let suffix = state
            .filter(|s| !s.is_empty() && *s != place)
            .or_else(|| country.filter(|c| !c.is_empty() && *c != place));

        Some(match suffix {
            Some(s) => format!("{}, {}", place, s),
            None => place,
        })
    }
}

/// Reverse geocoding through Nominatim
#[derive(Debug, Clone)]
pub struct NominatimReverseGeocoder {
    client: Client,
    url: String,
}

impl NominatimReverseGeocoder {
    pub fn new(config: &LocationConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REVERSE_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: config.reverse_geocode_url.clone(),
        })
    }

    /// Resolve coordinates to a display name.
    #[instrument(skip(self), level = "debug")]
    pub async fn reverse(&self, coordinates: Coordinates) -> Result<String, LocationError> {
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let query = [
            ("lat", latitude.as_str()),
            ("lon", longitude.as_str()),
            ("format", "json"),
            ("addressdetails", "1"),
            ("layer", "address"),
            ("zoom", "10"),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Other(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::Other(format!(
                "Reverse geocode returned status {}",
                response.status()
            )));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("Reverse geocode parse error: {}", e)))?;

        let name = body
            .address
            .and_then(NominatimAddress::display_name)
            .ok_or_else(|| LocationError::Other("No address for coordinates".to_string()))?;

        tracing::info!("Reverse geocoded to: {}", name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server: &MockServer) -> OpenMeteoGeocoder {
        let weather = WeatherConfig {
            geocoding_base_url: server.uri(),
            ..WeatherConfig::default()
        };
        OpenMeteoGeocoder::new(&weather, &SearchConfig::default())
            .unwrap()
            .with_retry(RetryConfig::none())
    }

    #[tokio::test]
    async fn test_search_returns_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Rome"))
            .and(query_param("count", "10"))
            .and(query_param("language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": 3169070, "name": "Rome", "latitude": 41.89193, "longitude": 12.51133,
                     "country": "Italy", "admin1": "Lazio", "country_code": "IT"},
                    {"id": 4219762, "name": "Rome", "latitude": 34.25704, "longitude": -85.16467,
                     "country": "United States", "admin1": "Georgia"}
                ]
            })))
            .mount(&server)
            .await;

        let results = geocoder_for(&server).search("Rome").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].admin1.as_deref(), Some("Lazio"));
        assert_eq!(results[1].country_code, None);
    }

    #[tokio::test]
    async fn test_search_without_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "generationtime_ms": 0.4 })),
            )
            .mount(&server)
            .await;

        let results = geocoder_for(&server).search("Xyzzy").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_geocode_prefers_city_with_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "47.6062"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Seattle, King County, Washington, United States",
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .mount(&server)
            .await;

        let config = LocationConfig {
            reverse_geocode_url: format!("{}/reverse", server.uri()),
            ..LocationConfig::default()
        };
        let geocoder = NominatimReverseGeocoder::new(&config).unwrap();
        let name = geocoder
            .reverse(Coordinates::new(47.6062, -122.3321))
            .await
            .unwrap();
        assert_eq!(name, "Seattle, Washington");
    }

    #[tokio::test]
    async fn test_reverse_geocode_without_address_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let config = LocationConfig {
            reverse_geocode_url: format!("{}/reverse", server.uri()),
            ..LocationConfig::default()
        };
        let geocoder = NominatimReverseGeocoder::new(&config).unwrap();
        assert!(geocoder.reverse(Coordinates::new(0.0, 0.0)).await.is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_country_suffix() {
        let addr = NominatimAddress {
            city: None,
            town: Some("Hallstatt".into()),
            village: None,
            municipality: None,
            state_district: None,
            state: None,
            county: None,
            country: Some("Austria".into()),
        };
        assert_eq!(addr.display_name().as_deref(), Some("Hallstatt, Austria"));
    }

    #[test]
    fn test_display_name_skips_suffix_equal_to_place() {
        let addr = NominatimAddress {
            city: None,
            town: None,
            village: None,
            municipality: None,
            state_district: None,
            state: Some("Berlin".into()),
            county: None,
            country: None,
        };
        assert_eq!(addr.display_name().as_deref(), Some("Berlin"));
    }
}
