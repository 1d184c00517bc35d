//! Weather caching and display orchestration for Breeze
//!
//! - [`LocationCacheService`] decides what to fetch and persists the results
//! - [`SearchDebouncer`] turns keystrokes into geocoding calls
//! - [`WeatherSession`] drives the main display state machine

pub mod error_mapping;
pub mod forecast;
pub mod freshness;
pub mod location_cache;
pub mod search;
pub mod session;

pub use error_mapping::IntoAppError;
pub use freshness::{is_fresh, locations_needing_refresh, now_millis, FRESHNESS_WINDOW_MS};
pub use location_cache::{DeviceFix, LocationCacheService, RefreshGate};
pub use search::{SearchDebouncer, SearchState};
pub use session::{DisplayState, WeatherDisplay, WeatherSession};
