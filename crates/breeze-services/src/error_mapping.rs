//! Conversions from crate-level errors into [`AppError`].

use breeze_core::{
    AppError, DatabaseError, DecodeError, LocationError as CoreLocationError, NetworkError,
    ReqwestErrorExt, WeatherError as CoreWeatherError,
};
use breeze_store::StoreError;
use breeze_weather::{LocationError, WeatherError};

/// Extension trait for turning a component error into an [`AppError`].
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for WeatherError {
    fn into_app_error(self) -> AppError {
        match self {
            WeatherError::Network(e) => AppError::Network(e.into_network_error()),
            WeatherError::Status { status } if status >= 500 => {
                AppError::Network(NetworkError::ServerError {
                    status,
                    message: "forecast service error".to_string(),
                })
            }
            WeatherError::Status { status } => {
                AppError::Weather(CoreWeatherError::ApiError(format!("status {}", status)))
            }
            WeatherError::Timeout => AppError::Network(NetworkError::Timeout),
            WeatherError::Decode(msg) => AppError::Decode(DecodeError(msg)),
        }
    }
}

impl IntoAppError for LocationError {
    fn into_app_error(self) -> AppError {
        match self {
            LocationError::PermissionDenied => AppError::Location(CoreLocationError::PermissionDenied),
            LocationError::Timeout => AppError::Location(CoreLocationError::Timeout),
            LocationError::ServiceUnavailable => AppError::Location(CoreLocationError::Unavailable),
            LocationError::Other(msg) => {
                tracing::debug!("Location failure: {}", msg);
                AppError::Location(CoreLocationError::Unavailable)
            }
        }
    }
}

impl IntoAppError for StoreError {
    fn into_app_error(self) -> AppError {
        match self {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Backend(msg) => AppError::Database(DatabaseError::QueryFailed(msg)),
            StoreError::Encode(e) => AppError::Database(DatabaseError::QueryFailed(e.to_string())),
        }
    }
}
