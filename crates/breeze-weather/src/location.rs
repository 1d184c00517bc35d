//! Device position access.
//!
//! Desktop builds have no GPS, so the default provider reads a fixed
//! position and a permission flag from configuration.

use async_trait::async_trait;
use breeze_core::LocationConfig;

use crate::geocode::NominatimReverseGeocoder;
use crate::types::{Coordinates, LocationError, WeatherError};

#[async_trait]
pub trait DeviceLocationProvider: Send + Sync {
    /// Whether the user has granted location access
    fn has_permission(&self) -> bool;

    /// Current device coordinates
    async fn current_coordinates(&self) -> Result<Coordinates, LocationError>;

    /// Human readable name for a coordinate
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<String, LocationError>;
}

pub struct ConfiguredLocationProvider {
    permission_granted: bool,
    fix: Option<Coordinates>,
    reverse: NominatimReverseGeocoder,
}

impl ConfiguredLocationProvider {
    pub fn new(config: &LocationConfig) -> Result<Self, WeatherError> {
        Ok(Self {
            permission_granted: config.permission_granted,
            fix: config
                .fix()
                .map(|(latitude, longitude)| Coordinates::new(latitude, longitude)),
            reverse: NominatimReverseGeocoder::new(config)?,
        })
    }
}

#[async_trait]
impl DeviceLocationProvider for ConfiguredLocationProvider {
    fn has_permission(&self) -> bool {
        self.permission_granted
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        if !self.permission_granted {
            return Err(LocationError::PermissionDenied);
        }
        self.fix.ok_or(LocationError::ServiceUnavailable)
    }

    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<String, LocationError> {
        self.reverse.reverse(coordinates).await
    }
}
