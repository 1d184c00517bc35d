//! Persisted saved-location list and selected-location record.
//!
//! The store owns the in-memory copy of both values. Every mutation takes
//! one async lock, writes the backend, then publishes the new value to
//! subscribers, so observers only ever see persisted state.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::kv::KeyValueStore;
use crate::model::{SavedLocation, WeatherPatch};
use crate::StoreError;

pub const SAVED_LOCATIONS_KEY: &str = "saved_locations";
pub const SELECTED_LOCATION_KEY: &str = "selected_location";

pub struct LocationStore {
    backend: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
    saved: watch::Sender<Vec<SavedLocation>>,
    selected: watch::Sender<Option<SavedLocation>>,
}

impl LocationStore {
    /// Load both values from `backend`.
    ///
    /// Missing or unreadable payloads start out empty.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let saved = load_saved(backend.as_ref());
        let selected = load_selected(backend.as_ref());
        tracing::debug!(
            "Loaded {} saved locations (selected: {})",
            saved.len(),
            selected.as_ref().map(|s| s.id.as_str()).unwrap_or("none")
        );

        let (saved, _) = watch::channel(saved);
        let (selected, _) = watch::channel(selected);

        Self {
            backend,
            write_lock: Mutex::new(()),
            saved,
            selected,
        }
    }

    /// Subscribe to the saved list. The current value is marked as unseen,
    /// so the first `changed()` resolves immediately.
    pub fn observe_saved_locations(&self) -> watch::Receiver<Vec<SavedLocation>> {
        let mut rx = self.saved.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn observe_selected_location(&self) -> watch::Receiver<Option<SavedLocation>> {
        let mut rx = self.selected.subscribe();
        rx.mark_changed();
        rx
    }

    pub fn saved_locations(&self) -> Vec<SavedLocation> {
        self.saved.borrow().clone()
    }

    pub fn selected_location(&self) -> Option<SavedLocation> {
        self.selected.borrow().clone()
    }

    /// Replace the entry with the same id, or append.
    pub async fn upsert_saved_location(&self, location: SavedLocation) -> Result<(), StoreError> {
        self.mutate_saved(|list| {
            match list.iter_mut().find(|l| l.id == location.id) {
                Some(existing) => *existing = location,
                None => list.push(location),
            }
            true
        })
        .await?;
        Ok(())
    }

    /// Merge weather fields into the entry with `id`.
    ///
    /// Returns false (and writes nothing) when no entry has that id.
    pub async fn update_weather_fields(&self, id: &str, patch: &WeatherPatch) -> Result<bool, StoreError> {
        self.mutate_saved(|list| match list.iter_mut().find(|l| l.id == id) {
            Some(existing) => {
                existing.apply(patch);
                true
            }
            None => false,
        })
        .await
    }

    /// Remove the entry with `id`. Absent ids are a no-op.
    pub async fn delete_saved_location(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate_saved(|list| {
            let before = list.len();
            list.retain(|l| l.id != id);
            list.len() != before
        })
        .await
    }

    pub async fn set_selected_location(&self, location: SavedLocation) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let raw = serde_json::to_string(&location)?;
        self.backend.put(SELECTED_LOCATION_KEY, &raw)?;
        self.selected.send_replace(Some(location));
        Ok(())
    }

    /// Merge weather fields into the selected record if it still has `id`.
    pub async fn update_selected_weather(&self, id: &str, patch: &WeatherPatch) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let updated = match self.selected.borrow().as_ref() {
            Some(current) if current.id == id => current.clone().with_weather(patch),
            _ => return Ok(false),
        };
        let raw = serde_json::to_string(&updated)?;
        self.backend.put(SELECTED_LOCATION_KEY, &raw)?;
        self.selected.send_replace(Some(updated));
        Ok(true)
    }

    async fn mutate_saved<F>(&self, apply: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<SavedLocation>) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut list = self.saved.borrow().clone();
        if !apply(&mut list) {
            return Ok(false);
        }
        let raw = serde_json::to_string(&list)?;
        self.backend.put(SAVED_LOCATIONS_KEY, &raw)?;
        self.saved.send_replace(list);
        Ok(true)
    }
}

fn load_saved(backend: &dyn KeyValueStore) -> Vec<SavedLocation> {
    let raw = match backend.get(SAVED_LOCATIONS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read saved locations: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<SavedLocation>>(&raw) {
        Ok(list) => collapse_duplicates(list),
        Err(e) => {
            tracing::warn!("Discarding corrupt saved locations payload: {}", e);
            Vec::new()
        }
    }
}

fn load_selected(backend: &dyn KeyValueStore) -> Option<SavedLocation> {
    let raw = match backend.get(SELECTED_LOCATION_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("Failed to read selected location: {}", e);
            return None;
        }
    };

    serde_json::from_str(&raw)
        .map_err(|e| tracing::warn!("Discarding corrupt selected location payload: {}", e))
        .ok()
}

/// One entry per id, at the position of its first occurrence, holding the
/// last occurrence's values.
fn collapse_duplicates(list: Vec<SavedLocation>) -> Vec<SavedLocation> {
    let total = list.len();
    let mut unique: Vec<SavedLocation> = Vec::with_capacity(total);
    for location in list {
        match unique.iter_mut().find(|l| l.id == location.id) {
            Some(existing) => *existing = location,
            None => unique.push(location),
        }
    }
    if unique.len() != total {
        tracing::warn!("Collapsed {} duplicate saved locations", total - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::kv::MemoryStore;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn put(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }
    }

    fn loc(id: &str, name: &str) -> SavedLocation {
        SavedLocation::new(id, name, 10.0, 20.0)
    }

    #[tokio::test]
    async fn test_upsert_same_id_keeps_single_entry() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));

        store.upsert_saved_location(loc("a", "First")).await.unwrap();
        store.upsert_saved_location(loc("b", "Other")).await.unwrap();
        store.upsert_saved_location(loc("a", "Second")).await.unwrap();

        let saved = store.saved_locations();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].id, "a");
        assert_eq!(saved[0].name, "Second");
        assert_eq!(saved[1].id, "b");
    }

    #[tokio::test]
    async fn test_update_weather_fields_preserves_identity() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));
        let original = SavedLocation {
            country: "Italy".into(),
            ..SavedLocation::new("a", "Rome", 41.9, 12.5)
        };
        store.upsert_saved_location(original).await.unwrap();

        let patch = WeatherPatch {
            temperature: 30.0,
            last_updated: 99,
            ..WeatherPatch::default()
        };
        assert!(store.update_weather_fields("a", &patch).await.unwrap());

        let updated = &store.saved_locations()[0];
        assert_eq!(updated.name, "Rome");
        assert_eq!(updated.country, "Italy");
        assert_eq!(updated.latitude, 41.9);
        assert_eq!(updated.longitude, 12.5);
        assert_eq!(updated.temperature, 30.0);
        assert_eq!(updated.last_updated, 99);
    }

    #[tokio::test]
    async fn test_update_weather_fields_absent_id_is_noop() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));
        store.upsert_saved_location(loc("a", "A")).await.unwrap();

        let applied = store
            .update_weather_fields("missing", &WeatherPatch::default())
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(store.saved_locations(), vec![loc("a", "A")]);
    }

    #[tokio::test]
    async fn test_delete_absent_id_is_noop() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));
        store.upsert_saved_location(loc("a", "A")).await.unwrap();

        assert!(!store.delete_saved_location("missing").await.unwrap());
        assert_eq!(store.saved_locations().len(), 1);

        assert!(store.delete_saved_location("a").await.unwrap());
        assert!(store.saved_locations().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let store = LocationStore::new(backend.clone());
            store.upsert_saved_location(loc("a", "A")).await.unwrap();
            store.set_selected_location(loc("s", "Sel")).await.unwrap();
        }

        let reloaded = LocationStore::new(backend);
        assert_eq!(reloaded.saved_locations(), vec![loc("a", "A")]);
        assert_eq!(reloaded.selected_location(), Some(loc("s", "Sel")));
    }

    #[tokio::test]
    async fn test_corrupt_payloads_degrade_to_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(SAVED_LOCATIONS_KEY, "[{not json").unwrap();
        backend.put(SELECTED_LOCATION_KEY, "42").unwrap();

        let store = LocationStore::new(backend);
        assert!(store.saved_locations().is_empty());
        assert_eq!(store.selected_location(), None);
    }

    #[tokio::test]
    async fn test_stored_duplicates_are_collapsed() {
        let backend = Arc::new(MemoryStore::new());
        let payload = serde_json::to_string(&vec![loc("a", "Old"), loc("b", "B"), loc("a", "New")]).unwrap();
        backend.put(SAVED_LOCATIONS_KEY, &payload).unwrap();

        let store = LocationStore::new(backend);
        let saved = store.saved_locations();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].id, "a");
        assert_eq!(saved[0].name, "New");
    }

    #[tokio::test]
    async fn test_observe_delivers_current_then_updates() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));
        store.upsert_saved_location(loc("a", "A")).await.unwrap();

        let mut rx = store.observe_saved_locations();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.upsert_saved_location(loc("b", "B")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_are_not_lost() {
        let store = Arc::new(LocationStore::new(Arc::new(MemoryStore::new())));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert_saved_location(loc(&format!("id-{}", i), "X")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.saved_locations().len(), 20);
    }

    #[tokio::test]
    async fn test_write_failure_propagates_and_leaves_state() {
        let store = LocationStore::new(Arc::new(ReadOnlyStore));
        let mut rx = store.observe_saved_locations();
        rx.borrow_and_update();

        let err = store.upsert_saved_location(loc("a", "A")).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.saved_locations().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_update_selected_weather_checks_id() {
        let store = LocationStore::new(Arc::new(MemoryStore::new()));
        store.set_selected_location(loc("s", "Sel")).await.unwrap();

        let patch = WeatherPatch {
            last_updated: 7,
            ..WeatherPatch::default()
        };
        assert!(!store.update_selected_weather("other", &patch).await.unwrap());
        assert!(store.update_selected_weather("s", &patch).await.unwrap());
        assert_eq!(store.selected_location().map(|s| s.last_updated), Some(7));
    }
}
