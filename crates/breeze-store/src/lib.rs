//! Persistence for Breeze saved locations
//!
//! A [`LocationStore`] keeps the ordered saved list and the selected record
//! on top of any [`KeyValueStore`] backend and publishes changes through
//! `tokio::sync::watch` channels.

pub mod error;
pub mod kv;
pub mod location_store;
pub mod model;

pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use location_store::{LocationStore, SAVED_LOCATIONS_KEY, SELECTED_LOCATION_KEY};
pub use model::{SavedLocation, WeatherPatch, CURRENT_LOCATION_ID, SELECTED_LOCATION_ID};
