//! Orchestration between the weather APIs and the location store.
//!
//! Background refreshes never fail outward: a failed fetch leaves the
//! entry as it was and is logged. Only store writes report errors.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breeze_core::WeatherConfig;
use breeze_store::{LocationStore, SavedLocation, StoreError, WeatherPatch, CURRENT_LOCATION_ID};
use breeze_weather::{
    Coordinates, DeviceLocationProvider, GeocodingResult, WeatherError, WeatherFetcher,
    WeatherResponse,
};
use futures::future::join_all;
use tracing::instrument;

use crate::freshness::{locations_needing_refresh, now_millis};

/// Name used when reverse geocoding a device fix fails
pub const UNKNOWN_LOCATION_NAME: &str = "Unknown Location";

/// Country label of the device-position entry
pub const MY_LOCATION_LABEL: &str = "My Location";

/// Build the weather fields of a saved location from a forecast response.
pub fn patch_from_response(response: &WeatherResponse, now: i64) -> WeatherPatch {
    let current = &response.current;
    let condition = current.condition();
    WeatherPatch {
        temperature: current.temperature,
        apparent_temperature: current.apparent_temperature,
        humidity: current.humidity,
        wind_speed: current.wind_speed,
        weather_code: current.weather_code,
        weather_condition: condition.description().to_string(),
        weather_icon: condition.icon_name().to_string(),
        last_updated: now,
    }
}

#[derive(Debug, Default)]
struct GateEntry {
    issued: u64,
    committed: u64,
}

/// Gate key of the selected record, kept apart from the saved-list ids
const SELECTED_RECORD_KEY: &str = "selected:record";

/// Orders persisted refreshes of the same id.
///
/// A ticket is taken when a refresh is issued. When it completes, its write
/// runs only if no later-issued refresh of that id has committed already.
#[derive(Debug, Default)]
pub struct RefreshGate {
    entries: parking_lot::Mutex<HashMap<String, GateEntry>>,
    commit_lock: tokio::sync::Mutex<()>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, id: &str) -> u64 {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id.to_string()).or_default();
        entry.issued += 1;
        entry.issued
    }

    /// Stop tracking `id`, e.g. once its entry is deleted.
    pub fn forget(&self, id: &str) {
        self.entries.lock().remove(id);
    }

    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }

    /// Run `write` if `ticket` is newer than the last committed ticket for `id`.
    ///
    /// Returns `None` when the ticket was superseded.
    pub async fn commit<F, Fut, T>(&self, id: &str, ticket: u64, write: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.commit_lock.lock().await;
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(id.to_string()).or_default();
            if ticket <= entry.committed {
                tracing::debug!("Dropping superseded refresh of {} (ticket {})", id, ticket);
                return None;
            }
            entry.committed = ticket;
        }
        Some(write().await)
    }
}

/// Outcome of reading the device position.
#[derive(Debug, Clone)]
pub struct DeviceFix {
    /// The persisted `current_location` entry
    pub location: SavedLocation,
    /// The forecast it was built from, `None` when the fetch failed
    pub forecast: Option<WeatherResponse>,
}

pub struct LocationCacheService {
    store: Arc<LocationStore>,
    weather: Arc<dyn WeatherFetcher>,
    device: Arc<dyn DeviceLocationProvider>,
    fetch_timeout: Duration,
    gate: RefreshGate,
    first_launch_checked: AtomicBool,
}

impl LocationCacheService {
    pub fn new(
        store: Arc<LocationStore>,
        weather: Arc<dyn WeatherFetcher>,
        device: Arc<dyn DeviceLocationProvider>,
        config: &WeatherConfig,
    ) -> Self {
        Self {
            store,
            weather,
            device,
            fetch_timeout: Duration::from_secs(config.request_timeout_secs),
            gate: RefreshGate::new(),
            first_launch_checked: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<LocationStore> {
        &self.store
    }

    pub fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    pub fn has_location_permission(&self) -> bool {
        self.device.has_permission()
    }

    pub fn get_locations_needing_refresh(&self, locations: &[SavedLocation], now: i64) -> Vec<SavedLocation> {
        locations_needing_refresh(locations, now)
    }

    /// Foreground forecast fetch under the fetch timeout.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_forecast(&self, coordinates: Coordinates) -> Result<WeatherResponse, WeatherError> {
        tokio::time::timeout(self.fetch_timeout, self.weather.fetch(coordinates))
            .await
            .map_err(|_| WeatherError::Timeout)?
    }

    /// Fetch fresh weather for `location`.
    ///
    /// On any failure the input comes back unchanged.
    pub async fn refresh_one(&self, location: SavedLocation) -> SavedLocation {
        match self.fetch_forecast(location_coordinates(&location)).await {
            Ok(response) => location.with_weather(&patch_from_response(&response, now_millis())),
            Err(e) => {
                tracing::warn!("Weather refresh for '{}' failed: {}", location.name, e);
                location
            }
        }
    }

    /// Refresh every location concurrently. Output order matches input order.
    pub async fn refresh_all(&self, locations: Vec<SavedLocation>) -> Vec<SavedLocation> {
        join_all(locations.into_iter().map(|l| self.refresh_one(l))).await
    }

    /// Refresh the stale saved locations and persist each success.
    ///
    /// Returns how many entries were updated.
    pub async fn refresh_stale(&self) -> usize {
        let stale = locations_needing_refresh(&self.store.saved_locations(), now_millis());
        if stale.is_empty() {
            tracing::debug!("All saved locations are fresh");
            return 0;
        }
        tracing::info!("Refreshing {} stale saved locations", stale.len());
        self.refresh_and_persist_all(stale).await
    }

    /// Refresh every saved location regardless of age.
    pub async fn refresh_saved(&self) -> usize {
        let saved = self.store.saved_locations();
        tracing::info!("Refreshing all {} saved locations", saved.len());
        self.refresh_and_persist_all(saved).await
    }

    async fn refresh_and_persist_all(&self, locations: Vec<SavedLocation>) -> usize {
        let outcomes = join_all(locations.iter().map(|l| self.refresh_and_persist(l))).await;
        outcomes.into_iter().filter(|updated| *updated).count()
    }

    async fn refresh_and_persist(&self, location: &SavedLocation) -> bool {
        let ticket = self.gate.issue(&location.id);
        let response = match self.fetch_forecast(location_coordinates(location)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Background refresh of '{}' failed: {}", location.name, e);
                return false;
            }
        };

        let patch = patch_from_response(&response, now_millis());
        let written = self
            .gate
            .commit(&location.id, ticket, || self.store.update_weather_fields(&location.id, &patch))
            .await;

        match written {
            Some(Ok(updated)) => updated,
            Some(Err(e)) => {
                tracing::warn!("Failed to persist weather for '{}': {}", location.name, e);
                false
            }
            None => false,
        }
    }

    /// Foreground load: fetch `location` and make it the selected record.
    ///
    /// The saved entry sharing its id gets the new weather too. The selected
    /// record and the saved entry are ordered separately, so a later-issued
    /// write to one never drops the other.
    pub async fn load_selected(
        &self,
        location: SavedLocation,
    ) -> Result<(SavedLocation, WeatherResponse), WeatherError> {
        let selected_ticket = self.gate.issue(SELECTED_RECORD_KEY);
        let saved_ticket = self.gate.issue(&location.id);
        let response = self.fetch_forecast(location_coordinates(&location)).await?;

        let patch = patch_from_response(&response, now_millis());
        let updated = location.with_weather(&patch);
        let selected = self
            .gate
            .commit(SELECTED_RECORD_KEY, selected_ticket, || {
                self.store.set_selected_location(updated.clone())
            })
            .await;
        if let Some(Err(e)) = selected {
            tracing::warn!("Failed to persist selected location '{}': {}", updated.name, e);
        }

        self.persist_saved_weather(&updated, saved_ticket, &patch).await;
        Ok((updated, response))
    }

    async fn persist_saved_weather(&self, location: &SavedLocation, ticket: u64, patch: &WeatherPatch) {
        let written = self
            .gate
            .commit(&location.id, ticket, || self.store.update_weather_fields(&location.id, patch))
            .await;
        if let Some(Err(e)) = written {
            tracing::warn!("Failed to persist weather for '{}': {}", location.name, e);
        }
    }

    /// Fetch weather for the selected record and write it back.
    ///
    /// The saved entry sharing the selected id is updated too. Returns the
    /// updated record and its forecast, or `None` when the fetch failed or a
    /// newer write of the selected record already landed.
    pub async fn refresh_selected(
        &self,
        selected: &SavedLocation,
    ) -> Option<(SavedLocation, WeatherResponse)> {
        let selected_ticket = self.gate.issue(SELECTED_RECORD_KEY);
        let saved_ticket = self.gate.issue(&selected.id);
        let response = match self.fetch_forecast(location_coordinates(selected)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Refresh of selected location '{}' failed: {}", selected.name, e);
                return None;
            }
        };

        let patch = patch_from_response(&response, now_millis());
        self.persist_saved_weather(selected, saved_ticket, &patch).await;

        let written = self
            .gate
            .commit(SELECTED_RECORD_KEY, selected_ticket, || {
                self.store.update_selected_weather(&selected.id, &patch)
            })
            .await?;
        if let Err(e) = written {
            tracing::warn!("Failed to persist selected location weather: {}", e);
        }
        Some((selected.clone().with_weather(&patch), response))
    }

    /// Create the `current_location` entry from the device position.
    ///
    /// Returns `None` without permission or without a fix; the caller then
    /// falls back to a default place.
    pub async fn bootstrap_from_device_location(&self) -> Result<Option<SavedLocation>, StoreError> {
        Ok(self.bootstrap_device().await?.map(|fix| fix.location))
    }

    /// Run the device bootstrap once per service instance, and only when
    /// nothing has been saved yet.
    pub async fn bootstrap_on_first_launch(&self) -> Result<Option<DeviceFix>, StoreError> {
        if self.first_launch_checked.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        if !self.store.saved_locations().is_empty() || !self.device.has_permission() {
            return Ok(None);
        }
        tracing::info!("First launch: locating device");
        self.bootstrap_device().await
    }

    /// Device bootstrap keeping the fetched forecast for display.
    pub async fn bootstrap_device(&self) -> Result<Option<DeviceFix>, StoreError> {
        if !self.device.has_permission() {
            tracing::debug!("No location permission, skipping device bootstrap");
            return Ok(None);
        }

        let coordinates = match tokio::time::timeout(self.fetch_timeout, self.device.current_coordinates()).await {
            Ok(Ok(coordinates)) => coordinates,
            Ok(Err(e)) => {
                tracing::info!("No device fix: {}", e);
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!("Timed out waiting for a device fix");
                return Ok(None);
            }
        };

        let name = match tokio::time::timeout(self.fetch_timeout, self.device.reverse_geocode(coordinates)).await {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                UNKNOWN_LOCATION_NAME.to_string()
            }
            Err(_) => {
                tracing::warn!("Reverse geocoding timed out");
                UNKNOWN_LOCATION_NAME.to_string()
            }
        };

        let mut location = SavedLocation {
            country: MY_LOCATION_LABEL.to_string(),
            is_current_location: true,
            ..SavedLocation::new(CURRENT_LOCATION_ID, name, coordinates.latitude, coordinates.longitude)
        };

        let forecast = match self.fetch_forecast(coordinates).await {
            Ok(response) => {
                location.apply(&patch_from_response(&response, now_millis()));
                Some(response)
            }
            Err(e) => {
                tracing::warn!("Weather for device location failed: {}", e);
                None
            }
        };

        self.store.upsert_saved_location(location.clone()).await?;
        self.store.set_selected_location(location.clone()).await?;
        tracing::info!("Device location set to '{}'", location.name);

        Ok(Some(DeviceFix { location, forecast }))
    }

    pub async fn add_location(&self, location: SavedLocation) -> Result<(), StoreError> {
        tracing::info!("Saving location '{}'", location.name);
        self.store.upsert_saved_location(location).await
    }

    pub async fn delete_location(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.store.delete_saved_location(id).await?;
        self.gate.forget(id);
        Ok(removed)
    }

    /// Make `location` the selected record, keeping its `last_updated`.
    pub async fn select_location(&self, location: SavedLocation) -> Result<(), StoreError> {
        self.store.set_selected_location(location).await
    }

    /// A saved-location candidate for a geocoding match, with a fresh id
    pub fn location_from_search(result: &GeocodingResult) -> SavedLocation {
        SavedLocation {
            country: result.country.clone().unwrap_or_default(),
            state: result.admin1.clone().unwrap_or_default(),
            ..SavedLocation::new(
                uuid::Uuid::new_v4().to_string(),
                result.name.clone(),
                result.latitude,
                result.longitude,
            )
        }
    }
}

pub(crate) fn location_coordinates(location: &SavedLocation) -> Coordinates {
    Coordinates::new(location.latitude, location.longitude)
}
