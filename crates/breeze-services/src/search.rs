//! Search-as-you-type with a quiet period.
//!
//! Only one search task is live at a time. Starting a new one cancels the
//! previous token, and a task publishes its results only while holding the
//! slot lock with its own token still live.

use std::sync::Arc;
use std::time::Duration;

use breeze_core::SearchConfig;
use breeze_store::SavedLocation;
use breeze_weather::GeocodingFetcher;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::location_cache::LocationCacheService;

/// What the search screen shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    /// Matches annotated with current weather
    pub results: Vec<SavedLocation>,
    pub is_searching: bool,
}

struct Inner {
    geocoder: Arc<dyn GeocodingFetcher>,
    cache: Arc<LocationCacheService>,
    quiet_period: Duration,
    min_query_chars: usize,
    slot: Mutex<Option<CancellationToken>>,
    state: watch::Sender<SearchState>,
}

pub struct SearchDebouncer {
    inner: Arc<Inner>,
}

impl SearchDebouncer {
    pub fn new(
        geocoder: Arc<dyn GeocodingFetcher>,
        cache: Arc<LocationCacheService>,
        config: &SearchConfig,
    ) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                geocoder,
                cache,
                quiet_period: Duration::from_millis(config.debounce_ms),
                min_query_chars: config.min_query_chars,
                slot: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    /// Current snapshot
    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Feed the latest query text. Must be called from within a tokio runtime.
    pub fn on_query_changed(&self, text: &str) {
        let query = text.to_string();
        let mut slot = self.inner.slot.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        if query.chars().count() < self.inner.min_query_chars {
            self.inner.state.send_modify(|s| {
                s.query = query;
                s.results.clear();
                s.is_searching = false;
            });
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        drop(slot);

        self.inner.state.send_modify(|s| {
            s.query = query.clone();
            s.is_searching = true;
        });

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(query, token).await });
    }

    /// Drop any pending search. Existing results stay.
    pub fn cancel(&self) {
        if let Some(token) = self.inner.slot.lock().take() {
            token.cancel();
            tracing::debug!("Search cancelled");
        }
        self.inner.state.send_modify(|s| s.is_searching = false);
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        if let Some(token) = self.inner.slot.lock().take() {
            token.cancel();
        }
    }
}

impl Inner {
    async fn run(&self, query: String, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.quiet_period) => {}
        }

        let results = tokio::select! {
            _ = token.cancelled() => return,
            results = self.search(&query) => results,
        };

        let slot = self.slot.lock();
        if token.is_cancelled() {
            return;
        }
        tracing::debug!("Search '{}' produced {} results", query, results.len());
        self.state.send_modify(|s| {
            s.results = results;
            s.is_searching = false;
        });
        drop(slot);
    }

    async fn search(&self, query: &str) -> Vec<SavedLocation> {
        let matches = match self.geocoder.search(query).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Location search for '{}' failed: {}", query, e);
                return Vec::new();
            }
        };

        let candidates = matches.iter().map(LocationCacheService::location_from_search);
        join_all(candidates.map(|c| self.cache.refresh_one(c))).await
    }
}
