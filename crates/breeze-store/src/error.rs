use breeze_core::{DatabaseError, RusqliteErrorExt};
use thiserror::Error;

/// Errors raised while persisting locations.
///
/// Decoding a stored payload never fails; only writes and backend
/// access surface here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to encode locations: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into_database_error())
    }
}
