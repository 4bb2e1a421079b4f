use convoy_core::{CacheResult, CacheStore, Clock, StoreResult, TripRepository};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::listing::{RiderTrips, TripListing};

pub fn listing_key() -> String {
    "convoy:trips:listing".to_string()
}

pub fn rider_key(rider_id: &str) -> String {
    format!("convoy:riders:{}:trips", rider_id)
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub listing_ttl_seconds: u64,
    pub rider_ttl_seconds: u64,
    /// Upper bound on a single cache call. A slower call counts as a failure.
    pub op_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            listing_ttl_seconds: 60,
            rider_ttl_seconds: 30,
            op_timeout: Duration::from_millis(250),
        }
    }
}

/// Read-side cache for the trip listing and per-rider views.
///
/// The cache is never authoritative: every failure is logged and the read
/// falls through to the store. Seat allocation never reads through here.
pub struct CacheCoordinator {
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn TripRepository>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    open: AtomicBool,
}

impl CacheCoordinator {
    /// Starts closed; call [`CacheCoordinator::init`] before serving reads.
    pub fn new(
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn TripRepository>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            cache,
            store,
            clock,
            settings,
            open: AtomicBool::new(false),
        }
    }

    /// Open the coordinator, check the backend and warm the listing. A cache
    /// that is down at startup is logged, not fatal.
    pub async fn init(&self) {
        self.open.store(true, Ordering::SeqCst);

        if self.guarded("ping", self.cache.ping()).await.is_none() {
            warn!("Cache unreachable at startup, serving reads from the store");
            return;
        }

        match self.warm().await {
            Ok(count) => info!("Cache warmed with {} listed trips", count),
            Err(e) => warn!("Cache warm skipped: {}", e),
        }
    }

    /// Every later cache call becomes a no-op.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        info!("Cache coordinator closed");
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn listing(&self) -> StoreResult<Vec<TripListing>> {
        let key = listing_key();
        if let Some(listing) = self.read::<Vec<TripListing>>(&key).await {
            debug!("Listing served from cache");
            return Ok(listing);
        }

        let listing = self.rebuild_listing().await?;
        self.write(&key, &listing, self.settings.listing_ttl_seconds).await;
        Ok(listing)
    }

    pub async fn rider_trips(&self, rider_id: &str) -> StoreResult<RiderTrips> {
        let key = rider_key(rider_id);
        if let Some(view) = self.read::<RiderTrips>(&key).await {
            return Ok(view);
        }

        let view = RiderTrips::new(rider_id, self.store.rider_bookings(rider_id).await?);
        self.write(&key, &view, self.settings.rider_ttl_seconds).await;
        Ok(view)
    }

    /// Rebuild the listing from the store and push it into the cache.
    /// Returns the number of listed trips.
    pub async fn warm(&self) -> StoreResult<usize> {
        let listing = self.rebuild_listing().await?;
        self.write(&listing_key(), &listing, self.settings.listing_ttl_seconds).await;
        Ok(listing.len())
    }

    /// Drop the listing and the views of every rider the mutation touched.
    pub async fn invalidate(&self, rider_ids: &[String]) {
        let mut keys = Vec::with_capacity(rider_ids.len() + 1);
        keys.push(listing_key());
        keys.extend(rider_ids.iter().map(|r| rider_key(r)));

        if self.guarded("del", self.cache.del(&keys)).await.is_some() {
            debug!("Invalidated {} cache keys", keys.len());
        }
    }

    async fn rebuild_listing(&self) -> StoreResult<Vec<TripListing>> {
        let trips = self.store.list_trips(&TripListing::STATUSES).await?;
        Ok(TripListing::build(&trips, self.clock.now()))
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.guarded("get", self.cache.get(key)).await.flatten()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot encode cache entry {}: {}", key, e);
                return;
            }
        };
        self.guarded("set", self.cache.set_ex(key, &payload, ttl_seconds)).await;
    }

    async fn guarded<T>(&self, op: &'static str, call: impl Future<Output = CacheResult<T>>) -> Option<T> {
        if !self.is_open() {
            return None;
        }

        match tokio::time::timeout(self.settings.op_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "cache call failed");
                None
            }
            Err(_) => {
                warn!(op, timeout_ms = self.settings.op_timeout.as_millis() as u64, "cache call timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use convoy_core::{Booking, SystemClock, Trip, TripStatus};
    use convoy_store::{InMemoryCache, InMemoryTripRepository};

    struct StalledCache;

    #[async_trait]
    impl CacheStore for StalledCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            std::future::pending().await
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn del(&self, _keys: &[String]) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn ping(&self) -> CacheResult<()> {
            std::future::pending().await
        }
    }

    async fn seeded_store() -> (Arc<InMemoryTripRepository>, Trip) {
        let store = Arc::new(InMemoryTripRepository::new());
        let mut trip = Trip::draft("agency-1", "Lyon", "Paris", Utc::now() + ChronoDuration::hours(4), 3).unwrap();
        trip.status = TripStatus::Active;
        store.insert_trip(&trip).await.unwrap();
        (store, trip)
    }

    fn coordinator(cache: Arc<dyn CacheStore>, store: Arc<InMemoryTripRepository>) -> CacheCoordinator {
        let settings = CacheSettings {
            op_timeout: Duration::from_millis(50),
            ..CacheSettings::default()
        };
        CacheCoordinator::new(cache, store, Arc::new(SystemClock), settings)
    }

    #[tokio::test]
    async fn test_init_warms_listing() {
        let (store, trip) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let coordinator = coordinator(cache.clone(), store);

        coordinator.init().await;

        assert!(cache.contains(&listing_key()));
        let listing = coordinator.listing().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, trip.id);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let (store, trip) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let coordinator = coordinator(cache.clone(), store.clone());
        coordinator.init().await;
        assert_eq!(coordinator.listing().await.unwrap()[0].available_seats, 3);

        store.push_booking(trip.id, 0, &Booking::new(trip.id, "rider-1")).await.unwrap();
        // Stale until invalidated.
        assert_eq!(coordinator.listing().await.unwrap()[0].available_seats, 3);

        coordinator.invalidate(&["rider-1".to_string()]).await;
        assert!(!cache.contains(&listing_key()));
        assert_eq!(coordinator.listing().await.unwrap()[0].available_seats, 2);
    }

    #[tokio::test]
    async fn test_rider_view_cached_per_rider() {
        let (store, trip) = seeded_store().await;
        store.push_booking(trip.id, 0, &Booking::new(trip.id, "rider-1")).await.unwrap();
        let cache = Arc::new(InMemoryCache::new());
        let coordinator = coordinator(cache.clone(), store);
        coordinator.init().await;

        let view = coordinator.rider_trips("rider-1").await.unwrap();

        assert_eq!(view.trips.len(), 1);
        assert!(cache.contains(&rider_key("rider-1")));
        assert!(!cache.contains(&rider_key("rider-2")));
    }

    #[tokio::test]
    async fn test_outage_falls_back_to_store() {
        let (store, _trip) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        cache.set_offline(true);
        let coordinator = coordinator(cache, store);
        coordinator.init().await;

        assert_eq!(coordinator.listing().await.unwrap().len(), 1);
        coordinator.invalidate(&[]).await;
    }

    #[tokio::test]
    async fn test_stalled_cache_is_bounded() {
        let (store, _trip) = seeded_store().await;
        let coordinator = coordinator(Arc::new(StalledCache), store);
        coordinator.init().await;

        let listing = coordinator.listing().await.unwrap();
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_coordinator_skips_cache() {
        let (store, _trip) = seeded_store().await;
        let cache = Arc::new(InMemoryCache::new());
        let coordinator = coordinator(cache.clone(), store);
        coordinator.init().await;
        coordinator.close();

        cache.del(&[listing_key()]).await.unwrap();
        assert_eq!(coordinator.listing().await.unwrap().len(), 1);
        assert!(!coordinator.is_open());
        assert!(!cache.contains(&listing_key()));
    }
}
