use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the location database)
    pub config_dir: PathBuf,

    /// Forecast API settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Search-as-you-type settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Device location settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Location cache persistence
    #[serde(default)]
    pub store: StoreConfig,
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Value of the Open-Meteo `temperature_unit` query parameter
    pub fn as_query_value(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the forecast API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub geocoding_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of forecast days requested
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Temperature unit preference
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

fn default_api_base_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_forecast_days() -> u8 {
    7
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            geocoding_base_url: default_geocoding_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            forecast_days: default_forecast_days(),
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before a query is sent, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Queries shorter than this (in characters) clear the results
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// Maximum number of geocoding candidates
    #[serde(default = "default_result_count")]
    pub result_count: u32,

    /// Language of geocoding results
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_min_query_chars() -> usize {
    2
}

fn default_result_count() -> u32 {
    10
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_chars: default_min_query_chars(),
            result_count: default_result_count(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Whether the user granted access to the device position
    #[serde(default)]
    pub permission_granted: bool,

    /// Fixed device latitude (desktop builds have no GPS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    /// Fixed device longitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Reverse geocoding endpoint (Nominatim)
    #[serde(default = "default_reverse_geocode_url")]
    pub reverse_geocode_url: String,
}

fn default_reverse_geocode_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            permission_granted: false,
            latitude: None,
            longitude: None,
            reverse_geocode_url: default_reverse_geocode_url(),
        }
    }
}

impl LocationConfig {
    /// The configured fix, if both coordinates are present
    pub fn fix(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file name, relative to `config_dir`
    #[serde(default = "default_store_file_name")]
    pub file_name: String,
}

fn default_store_file_name() -> String {
    "locations.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: default_store_file_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("breeze");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            search: SearchConfig::default(),
            location: LocationConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults when missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_base_url, "weather.api_base_url", &mut result);
        self.validate_url(
            &self.weather.geocoding_base_url,
            "weather.geocoding_base_url",
            &mut result,
        );
        self.validate_url(
            &self.location.reverse_geocode_url,
            "location.reverse_geocode_url",
            &mut result,
        );

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.weather.request_timeout_secs > 300 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>5 minutes)",
            );
        }

        if self.weather.forecast_days == 0 || self.weather.forecast_days > 16 {
            result.add_error("weather.forecast_days", "Forecast days must be between 1 and 16");
        }

        if self.search.debounce_ms == 0 {
            result.add_warning(
                "search.debounce_ms",
                "Search debounce disabled (0 ms), every keystroke hits the API",
            );
        }

        if self.search.min_query_chars == 0 {
            result.add_warning("search.min_query_chars", "Empty queries will be searched");
        }

        if let Some(lat) = self.location.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                result.add_error("location.latitude", "Latitude must be within -90..=90");
            }
        }
        if let Some(lon) = self.location.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                result.add_error("location.longitude", "Longitude must be within -180..=180");
            }
        }
        if self.location.latitude.is_some() != self.location.longitude.is_some() {
            result.add_warning(
                "location",
                "Only one coordinate configured, device fix is ignored",
            );
        }
        if self.location.fix().is_some() && !self.location.permission_granted {
            result.add_warning(
                "location.permission_granted",
                "A device fix is configured but location permission is not granted",
            );
        }

        if self.store.file_name.trim().is_empty() {
            result.add_error("store.file_name", "Database file name cannot be empty");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the location database
    pub fn store_path(&self) -> PathBuf {
        self.config_dir.join(&self.store.file_name)
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("breeze");

        Ok(config_dir.join("config.toml"))
    }
}
