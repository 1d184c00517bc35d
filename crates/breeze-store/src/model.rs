use serde::{Deserialize, Serialize};

/// Id of the entry created from the device position
pub const CURRENT_LOCATION_ID: &str = "current_location";

/// Id of the record written when the main display loads an arbitrary coordinate
pub const SELECTED_LOCATION_ID: &str = "selected_location";

/// A place the user keeps, with the last weather observed there.
///
/// Every field is defaulted so payloads written by older builds still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedLocation {
    pub id: String,
    pub name: String,
    pub country: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub weather_condition: String,
    pub weather_icon: String,
    pub is_current_location: bool,
    pub is_selected: bool,
    /// Epoch millis of the last successful fetch, 0 when never fetched
    pub last_updated: i64,
}

impl SavedLocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// Whether weather has ever been fetched for this entry
    pub fn has_weather(&self) -> bool {
        self.last_updated != 0
    }

    /// Overwrite the weather fields, leaving identity untouched
    pub fn apply(&mut self, patch: &WeatherPatch) {
        self.temperature = patch.temperature;
        self.apparent_temperature = patch.apparent_temperature;
        self.humidity = patch.humidity;
        self.wind_speed = patch.wind_speed;
        self.weather_code = patch.weather_code;
        self.weather_condition = patch.weather_condition.clone();
        self.weather_icon = patch.weather_icon.clone();
        self.last_updated = patch.last_updated;
    }

    pub fn with_weather(mut self, patch: &WeatherPatch) -> Self {
        self.apply(patch);
        self
    }

    /// The weather subset of this entry
    pub fn weather(&self) -> WeatherPatch {
        WeatherPatch {
            temperature: self.temperature,
            apparent_temperature: self.apparent_temperature,
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            weather_code: self.weather_code,
            weather_condition: self.weather_condition.clone(),
            weather_icon: self.weather_icon.clone(),
            last_updated: self.last_updated,
        }
    }
}

/// Weather observation fields of a [`SavedLocation`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeatherPatch {
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub weather_condition: String,
    pub weather_icon: String,
    pub last_updated: i64,
}
