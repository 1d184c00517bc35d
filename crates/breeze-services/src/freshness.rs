//! Cache freshness policy.

use breeze_store::SavedLocation;

/// How long a fetched snapshot may be shown without refetching (30 minutes)
pub const FRESHNESS_WINDOW_MS: i64 = 30 * 60 * 1000;

/// Current wall-clock time in epoch millis
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A never-fetched entry is always stale. A timestamp ahead of `now`
/// (clock skew) counts as fresh.
pub fn is_fresh(location: &SavedLocation, now: i64) -> bool {
    location.last_updated != 0 && now.saturating_sub(location.last_updated) < FRESHNESS_WINDOW_MS
}

/// The stale entries of `locations`, in their original order
pub fn locations_needing_refresh(locations: &[SavedLocation], now: i64) -> Vec<SavedLocation> {
    locations
        .iter()
        .filter(|l| !is_fresh(l, now))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn updated_at(last_updated: i64) -> SavedLocation {
        SavedLocation {
            last_updated,
            ..SavedLocation::new("x", "X", 0.0, 0.0)
        }
    }

    #[test]
    fn test_never_fetched_is_stale() {
        let loc = updated_at(0);
        assert!(!is_fresh(&loc, 0));
        assert!(!is_fresh(&loc, 1));
        assert!(!is_fresh(&loc, i64::MAX));
    }

    #[test]
    fn test_window_boundary() {
        let t = 1_700_000_000_000;
        let loc = updated_at(t);
        assert!(is_fresh(&loc, t));
        assert!(is_fresh(&loc, t + FRESHNESS_WINDOW_MS - 1));
        assert!(!is_fresh(&loc, t + FRESHNESS_WINDOW_MS));
        assert!(!is_fresh(&loc, t + FRESHNESS_WINDOW_MS + 1));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let t = 1_700_000_000_000;
        assert!(is_fresh(&updated_at(t + 60_000), t));
    }

    #[test]
    fn test_needing_refresh_preserves_order() {
        let now = 10 * FRESHNESS_WINDOW_MS;
        let list = vec![
            SavedLocation { id: "a".into(), ..updated_at(0) },
            SavedLocation { id: "b".into(), ..updated_at(now - 1_000) },
            SavedLocation { id: "c".into(), ..updated_at(now - 2 * FRESHNESS_WINDOW_MS) },
        ];

        let ids: Vec<_> = locations_needing_refresh(&list, now)
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
