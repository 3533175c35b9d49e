//! Explicit telemetry cache.
//!
//! One injected component owns the latest reading per desk. A background
//! task refreshes the whole fleet on a fixed interval; request handlers read
//! synchronously through [`TelemetrySource`]. Entries older than two refresh
//! intervals count as misses, so a dead telemetry source degrades into the
//! sampler's last-known-height fallback instead of serving stale motion
//! forever. `invalidate` drops a single desk's entry immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::client::DeskApiClient;
use super::types::{DeskTelemetry, TelemetryError, TelemetrySource};

struct CacheEntry {
    telemetry: DeskTelemetry,
    fetched_at: DateTime<Utc>,
}

pub struct TelemetryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_age: chrono::Duration,
}

impl TelemetryCache {
    /// `refresh_interval` is the cadence the owning refresh task will run
    /// at; entries survive two missed cycles before they become misses.
    pub fn new(refresh_interval: Duration) -> Self {
        let max_age = chrono::Duration::from_std(refresh_interval * 2)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    pub fn insert(&self, desk_id: &str, telemetry: DeskTelemetry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            desk_id.to_string(),
            CacheEntry {
                telemetry,
                fetched_at: Utc::now(),
            },
        );
    }

    pub fn invalidate(&self, desk_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(desk_id);
    }

    /// Replace the cache contents with a full fleet snapshot.
    pub fn replace_all(&self, fleet: HashMap<String, DeskTelemetry>) {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        for (desk_id, telemetry) in fleet {
            entries.insert(
                desk_id,
                CacheEntry {
                    telemetry,
                    fetched_at: now,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refresh the fleet once from the API. A failed cycle keeps the
    /// previous entries; they will age out on their own.
    pub async fn refresh(&self, client: &DeskApiClient) {
        match client.fetch_all().await {
            Ok(fleet) => {
                tracing::debug!("telemetry cache refreshed ({} desks)", fleet.len());
                self.replace_all(fleet);
            }
            Err(err) => {
                tracing::warn!("telemetry refresh failed, keeping previous entries: {}", err);
            }
        }
    }

    /// Refresh forever on `interval`. Spawn this on the runtime; it stops
    /// when the owning task is dropped at shutdown.
    pub async fn run_refresh_task(self: Arc<Self>, client: DeskApiClient, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh(&client).await;
        }
    }
}

impl TelemetrySource for TelemetryCache {
    fn get_state(&self, desk_id: &str) -> Result<DeskTelemetry, TelemetryError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(desk_id) {
            Some(entry) if Utc::now() - entry.fetched_at <= self.max_age => {
                Ok(entry.telemetry.clone())
            }
            Some(_) => Err(TelemetryError::CacheMiss(desk_id.to_string())),
            None => Err(TelemetryError::CacheMiss(desk_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_insert() {
        let cache = TelemetryCache::new(Duration::from_secs(3));
        cache.insert("d1", DeskTelemetry::new(700, 0));

        let state = cache.get_state("d1").unwrap();
        assert_eq!(state.position_mm, 700);
        assert!(matches!(
            cache.get_state("d2"),
            Err(TelemetryError::CacheMiss(_))
        ));
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let cache = TelemetryCache::new(Duration::from_secs(3));
        cache.insert("d1", DeskTelemetry::new(700, 0));
        cache.invalidate("d1");
        assert!(cache.get_state("d1").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        // Zero refresh interval makes every entry immediately stale.
        let cache = TelemetryCache::new(Duration::from_secs(0));
        cache.insert("d1", DeskTelemetry::new(700, 0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            cache.get_state("d1"),
            Err(TelemetryError::CacheMiss(_))
        ));
    }

    #[test]
    fn test_replace_all_swaps_fleet() {
        let cache = TelemetryCache::new(Duration::from_secs(3));
        cache.insert("old", DeskTelemetry::new(700, 0));

        let mut fleet = HashMap::new();
        fleet.insert("d1".to_string(), DeskTelemetry::new(1100, 32));
        cache.replace_all(fleet);

        assert!(cache.get_state("old").is_err());
        assert_eq!(cache.get_state("d1").unwrap().position_mm, 1100);
        assert_eq!(cache.len(), 1);
    }
}
