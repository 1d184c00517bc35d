//! Main display state machine.
//!
//! `Idle → Loading → Ready | Error`. Loading keeps the previous payload so
//! the display never flashes empty, and an error is left only by a new
//! action or [`WeatherSession::retry`]. Each foreground action bumps a
//! generation counter; results of an older generation are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use breeze_core::{AppError, WeatherError as CoreWeatherError};
use breeze_store::{SavedLocation, SELECTED_LOCATION_ID};
use breeze_weather::{default_place, LocationError, WeatherCondition, WeatherResponse};
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error_mapping::IntoAppError;
use crate::forecast::{
    date_label, daily_items, detail_metrics, hourly_items, weather_tips, DailyItem, DetailMetrics,
    Headline, HourlyItem, WeatherTip,
};
use crate::freshness::{is_fresh, now_millis};
use crate::location_cache::{DeviceFix, LocationCacheService};

/// Everything the main display renders.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherDisplay {
    /// Identity and latest snapshot of the shown place
    pub location: SavedLocation,
    /// Full forecast, absent when shown from the cached snapshot only
    pub forecast: Option<Arc<WeatherResponse>>,
    /// Forecast day picked by the user, `None` for the initial view
    pub selected_day: Option<usize>,
    pub headline: Headline,
    pub description: String,
    pub icon: String,
    pub date_label: String,
    pub daily: Vec<DailyItem>,
    pub hourly: Vec<HourlyItem>,
    pub details: Option<DetailMetrics>,
    pub tips: Vec<WeatherTip>,
}

impl WeatherDisplay {
    /// Display built from the stored snapshot alone
    pub fn from_cache(location: SavedLocation, today: NaiveDate) -> Self {
        let icon = if location.weather_icon.is_empty() {
            WeatherCondition::from_wmo_code(location.weather_code).icon_name().to_string()
        } else {
            location.weather_icon.clone()
        };
        let temperature = location.temperature as i32;

        Self {
            headline: Headline::Current {
                temperature,
                feels_like: location.apparent_temperature as i32,
            },
            description: location.weather_condition.clone(),
            icon,
            date_label: date_label(today),
            daily: Vec::new(),
            hourly: Vec::new(),
            details: None,
            tips: weather_tips(location.weather_code, temperature, 0, location.humidity),
            forecast: None,
            selected_day: None,
            location,
        }
    }

    pub fn from_forecast(location: SavedLocation, forecast: Arc<WeatherResponse>, today: NaiveDate) -> Self {
        let current = &forecast.current;
        let condition = current.condition();
        let temperature = current.temperature as i32;
        let uv_today = forecast.daily.uv_index_max.first().map(|uv| *uv as i32).unwrap_or(0);

        Self {
            headline: Headline::Current {
                temperature,
                feels_like: current.apparent_temperature as i32,
            },
            description: condition.description().to_string(),
            icon: condition.icon_name().to_string(),
            date_label: date_label(forecast.daily.date(0).unwrap_or(today)),
            daily: daily_items(&forecast, 0),
            hourly: hourly_items(&forecast, 0),
            details: detail_metrics(&forecast, 0),
            tips: weather_tips(current.weather_code, temperature, uv_today, current.humidity),
            selected_day: None,
            location,
            forecast: Some(forecast),
        }
    }

    /// The same place re-derived for forecast day `day`.
    ///
    /// `None` without a forecast payload or when `day` is out of range.
    pub fn for_day(&self, day: usize) -> Option<Self> {
        let forecast = self.forecast.clone()?;
        let daily = &forecast.daily;
        let date = daily.date(day)?;
        let code = *daily.weather_code.get(day)?;
        let high = *daily.temperature_max.get(day)? as i32;
        let low = *daily.temperature_min.get(day)? as i32;
        let uv = daily.uv_index_max.get(day).map(|uv| *uv as i32).unwrap_or(0);
        let condition = WeatherCondition::from_wmo_code(code);

        Some(Self {
            location: self.location.clone(),
            selected_day: Some(day),
            headline: Headline::Day { high, low },
            description: condition.description().to_string(),
            icon: condition.icon_name().to_string(),
            date_label: date_label(date),
            daily: daily_items(&forecast, day),
            hourly: hourly_items(&forecast, day),
            details: detail_metrics(&forecast, day),
            tips: weather_tips(code, high, uv, forecast.current.humidity),
            forecast: Some(forecast),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayState {
    #[default]
    Idle,
    Loading {
        last_good: Option<Arc<WeatherDisplay>>,
    },
    Ready(Arc<WeatherDisplay>),
    Error {
        message: String,
        last_good: Option<Arc<WeatherDisplay>>,
    },
}

impl DisplayState {
    /// The most recent successfully shown payload
    pub fn last_good(&self) -> Option<Arc<WeatherDisplay>> {
        match self {
            DisplayState::Idle => None,
            DisplayState::Loading { last_good } | DisplayState::Error { last_good, .. } => last_good.clone(),
            DisplayState::Ready(display) => Some(display.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DisplayState::Loading { .. })
    }
}

#[derive(Debug, Clone)]
enum Action {
    Start,
    DeviceLocation,
    Load(SavedLocation),
}

struct SessionInner {
    cache: Arc<LocationCacheService>,
    state: watch::Sender<DisplayState>,
    generation: AtomicU64,
    failed_action: Mutex<Option<Action>>,
}

pub struct WeatherSession {
    inner: Arc<SessionInner>,
    /// Pending background refresh of a stale selected record
    background: Mutex<Option<JoinHandle<()>>>,
}

impl WeatherSession {
    pub fn new(cache: Arc<LocationCacheService>) -> Self {
        let (state, _) = watch::channel(DisplayState::Idle);
        Self {
            inner: Arc::new(SessionInner {
                cache,
                state,
                generation: AtomicU64::new(0),
                failed_action: Mutex::new(None),
            }),
            background: Mutex::new(None),
        }
    }

    /// Subscribe to display changes. The first `changed()` resolves
    /// immediately with the current state.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        let mut rx = self.inner.state.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn state(&self) -> DisplayState {
        self.inner.state.borrow().clone()
    }

    /// Cold start: show the best available data with as few fetches as possible.
    pub async fn start(&self) {
        self.run(Action::Start).await;
    }

    /// Explicit "use my location".
    pub async fn use_device_location(&self) {
        self.run(Action::DeviceLocation).await;
    }

    /// Load an arbitrary place and remember it as the selected record.
    pub async fn show_location(&self, name: &str, latitude: f64, longitude: f64) {
        let location = SavedLocation::new(SELECTED_LOCATION_ID, name, latitude, longitude);
        self.run(Action::Load(location)).await;
    }

    /// Re-fetch the place currently on display.
    pub async fn refresh(&self) {
        let last_good = self.inner.state.borrow().last_good();
        let Some(display) = last_good else {
            tracing::debug!("Nothing on display to refresh");
            return;
        };
        self.run(Action::Load(display.location.clone())).await;
    }

    /// Re-run the action that last ended in an error.
    pub async fn retry(&self) {
        let action = self.inner.failed_action.lock().take();
        match action {
            Some(action) => self.run(action).await,
            None => tracing::debug!("No failed action to retry"),
        }
    }

    /// Wait for the pending background refresh, if any, to finish.
    pub async fn settle(&self) {
        let handle = self.background.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Background refresh ended abnormally: {}", e);
            }
        }
    }

    /// Show forecast day `index` from the loaded payload, without fetching.
    pub fn select_day(&self, index: usize) {
        let current = match &*self.inner.state.borrow() {
            DisplayState::Ready(display) => display.clone(),
            _ => return,
        };
        let Some(display) = current.for_day(index) else {
            tracing::debug!("Ignoring day {} selection", index);
            return;
        };

        let generation = self.inner.begin_loading();
        self.inner.apply(generation, display);
    }

    async fn run(&self, action: Action) {
        match action {
            Action::Start => self.cold_start().await,
            Action::DeviceLocation => self.device_location().await,
            Action::Load(location) => self.load(location).await,
        }
    }

    async fn cold_start(&self) {
        let cache = &self.inner.cache;
        let saved = cache.store().saved_locations();
        let selected = cache.store().selected_location();

        if saved.is_empty() && selected.is_none() && cache.has_location_permission() {
            let generation = self.inner.begin_loading();
            match cache.bootstrap_on_first_launch().await {
                Ok(Some(fix)) => {
                    self.show_fix(generation, fix);
                    return;
                }
                Ok(None) => tracing::info!("No device fix on first launch, using default place"),
                Err(e) => tracing::warn!("Device bootstrap could not be saved: {}", e),
            }
            self.load(default_location()).await;
            return;
        }

        match selected {
            Some(selected) if is_fresh(&selected, now_millis()) => {
                tracing::debug!("Selected location '{}' is fresh, skipping fetch", selected.name);
                let generation = self.inner.bump();
                self.inner.apply(generation, WeatherDisplay::from_cache(selected, today()));
            }
            Some(selected) => {
                tracing::debug!("Selected location '{}' is stale, refreshing", selected.name);
                let generation = self.inner.bump();
                self.inner
                    .apply(generation, WeatherDisplay::from_cache(selected.clone(), today()));

                let inner = self.inner.clone();
                let handle = tokio::spawn(async move {
                    if let Some((updated, forecast)) = inner.cache.refresh_selected(&selected).await {
                        let refreshed = WeatherDisplay::from_forecast(updated, Arc::new(forecast), today());
                        inner.apply(generation, refreshed);
                    }
                });
                if let Some(previous) = self.background.lock().replace(handle) {
                    previous.abort();
                }
            }
            None => match saved.into_iter().next() {
                Some(first) => self.load(first).await,
                None => self.load(default_location()).await,
            },
        }
    }

    async fn device_location(&self) {
        let generation = self.inner.begin_loading();
        match self.inner.cache.bootstrap_device().await {
            Ok(Some(fix)) => self.show_fix(generation, fix),
            Ok(None) => self.inner.fail(
                generation,
                Action::DeviceLocation,
                LocationError::ServiceUnavailable.into_app_error(),
            ),
            Err(e) => self.inner.fail(generation, Action::DeviceLocation, e.into_app_error()),
        }
    }

    fn show_fix(&self, generation: u64, fix: DeviceFix) {
        match fix.forecast {
            Some(forecast) => {
                let display = WeatherDisplay::from_forecast(fix.location, Arc::new(forecast), today());
                self.inner.apply(generation, display);
            }
            None => self.inner.fail(
                generation,
                Action::Load(fix.location),
                AppError::Weather(CoreWeatherError::ApiError("forecast unavailable".to_string())),
            ),
        }
    }

    async fn load(&self, location: SavedLocation) {
        let generation = self.inner.begin_loading();
        match self.inner.cache.load_selected(location.clone()).await {
            Ok((updated, forecast)) => {
                let display = WeatherDisplay::from_forecast(updated, Arc::new(forecast), today());
                self.inner.apply(generation, display);
            }
            Err(e) => self.inner.fail(generation, Action::Load(location), e.into_app_error()),
        }
    }
}

impl Drop for WeatherSession {
    fn drop(&mut self) {
        if let Some(handle) = self.background.lock().take() {
            handle.abort();
        }
    }
}

impl SessionInner {
    fn bump(&self) -> u64 {
        self.failed_action.lock().take();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn begin_loading(&self) -> u64 {
        let generation = self.bump();
        self.state.send_modify(|state| {
            let last_good = state.last_good();
            *state = DisplayState::Loading { last_good };
        });
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply(&self, generation: u64, shown: WeatherDisplay) {
        if !self.is_current(generation) {
            tracing::debug!("Dropping result of superseded action {}", generation);
            return;
        }
        let name = shown.location.name.clone();
        tracing::info!("Showing weather for '{}'", name);
        self.state.send_replace(DisplayState::Ready(Arc::new(shown)));
    }

    fn fail(&self, generation: u64, action: Action, error: AppError) {
        if !self.is_current(generation) {
            return;
        }
        tracing::warn!("Weather display action failed: {}", error);
        *self.failed_action.lock() = Some(action);
        self.state.send_modify(|state| {
            let last_good = state.last_good();
            *state = DisplayState::Error {
                message: error.user_message().to_string(),
                last_good,
            };
        });
    }
}

fn default_location() -> SavedLocation {
    let place = default_place();
    SavedLocation::new(
        SELECTED_LOCATION_ID,
        place.name,
        place.coordinates.latitude,
        place.coordinates.longitude,
    )
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
