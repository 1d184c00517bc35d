use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    ClearSky,
    MainlyClear,
    #[default]
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    Rain,
    Snow,
    RainShowers,
    SnowShowers,
    Thunderstorm,
    ThunderstormWithHail,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::ClearSky,
            1 => Self::MainlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            61 | 63 | 65 => Self::Rain,
            71 | 73 | 75 | 77 => Self::Snow,
            80 | 81 | 82 => Self::RainShowers,
            85 | 86 => Self::SnowShowers,
            95 => Self::Thunderstorm,
            96 | 99 => Self::ThunderstormWithHail,
            _ => Self::PartlyCloudy,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::ClearSky => "Clear sky",
            Self::MainlyClear => "Mainly clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::RainShowers => "Rain showers",
            Self::SnowShowers => "Snow showers",
            Self::Thunderstorm => "Thunderstorm",
            Self::ThunderstormWithHail => "Thunderstorm with hail",
        }
    }

    /// Get the icon identifier used by the display layer
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::ClearSky => "sun",
            Self::MainlyClear | Self::PartlyCloudy | Self::Overcast => "clouds",
            Self::Fog | Self::Snow | Self::SnowShowers => "cloudy",
            Self::Drizzle | Self::Rain | Self::RainShowers => "rain",
            Self::Thunderstorm | Self::ThunderstormWithHail => "thunder",
        }
    }

    /// True for codes that call for an umbrella
    pub fn is_wet(&self) -> bool {
        matches!(self, Self::Drizzle | Self::Rain | Self::RainShowers)
    }

    /// True for thunderstorm codes
    pub fn is_stormy(&self) -> bool {
        matches!(self, Self::Thunderstorm | Self::ThunderstormWithHail)
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A named place with coordinates, used for the built-in defaults
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPlace {
    pub name: &'static str,
    pub coordinates: Coordinates,
}

/// Places shown when neither a cached selection nor a device fix exists.
/// The first entry is the cold-start fallback.
pub const DEFAULT_PLACES: [NamedPlace; 5] = [
    NamedPlace {
        name: "Rome",
        coordinates: Coordinates {
            latitude: 41.9028,
            longitude: 12.4964,
        },
    },
    NamedPlace {
        name: "New York",
        coordinates: Coordinates {
            latitude: 40.7128,
            longitude: -74.0060,
        },
    },
    NamedPlace {
        name: "Tokyo",
        coordinates: Coordinates {
            latitude: 35.6762,
            longitude: 139.6503,
        },
    },
    NamedPlace {
        name: "London",
        coordinates: Coordinates {
            latitude: 51.5074,
            longitude: -0.1278,
        },
    },
    NamedPlace {
        name: "Paris",
        coordinates: Coordinates {
            latitude: 48.8566,
            longitude: 2.3522,
        },
    },
];

/// The deterministic fallback location
pub fn default_place() -> &'static NamedPlace {
    &DEFAULT_PLACES[0]
}

/// Current conditions block of a forecast response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub time: String,
    #[serde(rename = "temperature_2m")]
    pub temperature: f64,
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: i32,
    pub apparent_temperature: f64,
    pub weather_code: i32,
    #[serde(rename = "wind_speed_10m")]
    pub wind_speed: f64,
    #[serde(rename = "wind_direction_10m")]
    pub wind_direction: i32,
}

impl CurrentWeather {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Hourly series of a forecast response; all vectors are index-aligned
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HourlyWeather {
    pub time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    pub temperature: Vec<f64>,
    pub weather_code: Vec<i32>,
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: Vec<i32>,
}

/// Daily series of a forecast response; all vectors are index-aligned
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyWeather {
    pub time: Vec<String>,
    pub weather_code: Vec<i32>,
    #[serde(rename = "temperature_2m_max")]
    pub temperature_max: Vec<f64>,
    #[serde(rename = "temperature_2m_min")]
    pub temperature_min: Vec<f64>,
    #[serde(default)]
    pub uv_index_max: Vec<f64>,
}

impl DailyWeather {
    /// Parsed date of the given day, if present and well-formed
    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.time
            .get(index)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Complete forecast bundle for one coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: String,
    pub current: CurrentWeather,
    #[serde(default)]
    pub hourly: HourlyWeather,
    #[serde(default)]
    pub daily: DailyWeather,
}

/// Geocoding search envelope; `results` is absent when nothing matched
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingResponse {
    pub results: Option<Vec<GeocodingResult>>,
}

/// One candidate place from the geocoding API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    /// State or province
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status: {status}")]
    Status { status: u16 },
    #[error("Request timed out")]
    Timeout,
    #[error("Decode error: {0}")]
    Decode(String),
}

impl WeatherError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e)
        }
    }
}
