//! Weather data access for Breeze
//!
//! Forecasts and name search come from the Open-Meteo APIs, device
//! position from configuration with Nominatim reverse geocoding.

pub mod geocode;
pub mod location;
pub mod provider;
pub mod retry;
pub mod types;

pub use geocode::{GeocodingFetcher, NominatimReverseGeocoder, OpenMeteoGeocoder};
pub use location::{ConfiguredLocationProvider, DeviceLocationProvider};
pub use provider::{OpenMeteoProvider, WeatherFetcher};
pub use retry::RetryConfig;
pub use types::*;
