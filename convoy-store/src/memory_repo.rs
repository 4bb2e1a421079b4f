//! In-process implementations of the store, cache and notifier traits.
//!
//! Used by the test suites and by `RUN_MODE=memory`. The trip map sits behind
//! one async lock, so every conditional write is applied atomically.

use async_trait::async_trait;
use chrono::Utc;
use convoy_core::{
    Booking, BookingStatus, CacheError, CacheResult, CacheStore, Notifier, NotifyError, Precondition, RiderBooking,
    StoreResult, Trip, TripRepository, TripStatus, WriteOutcome,
};
use convoy_shared::RideEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: RwLock<HashMap<Uuid, Trip>>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn load_trip(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(self.trips.read().await.get(&id).cloned())
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn push_booking(&self, trip_id: Uuid, expected_booked: u32, booking: &Booking) -> StoreResult<WriteOutcome> {
        let mut trips = self.trips.write().await;
        let Some(trip) = trips.get_mut(&trip_id) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };

        if trip.status != TripStatus::Active || trip.booked_seats != expected_booked || trip.booked_seats >= trip.seats {
            return Ok(WriteOutcome::PreconditionFailed);
        }

        trip.bookings.push(booking.clone());
        trip.booked_seats += 1;
        trip.updated_at = Utc::now();
        Ok(WriteOutcome::Applied(trip.clone()))
    }

    async fn pull_booking(
        &self,
        trip_id: Uuid,
        expected_booked: u32,
        booking_id: Uuid,
        expected_status: BookingStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut trips = self.trips.write().await;
        let Some(trip) = trips.get_mut(&trip_id) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };

        let position = trip
            .bookings
            .iter()
            .position(|b| b.id == booking_id && b.status == expected_status);
        let Some(position) = position.filter(|_| trip.booked_seats == expected_booked) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };

        trip.bookings.remove(position);
        trip.booked_seats = trip.booked_seats.saturating_sub(1);
        trip.updated_at = Utc::now();
        Ok(WriteOutcome::Applied(trip.clone()))
    }

    async fn update_trip(&self, trip: &Trip, expected: Precondition) -> StoreResult<WriteOutcome> {
        let mut trips = self.trips.write().await;
        let Some(stored) = trips.get_mut(&trip.id) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };

        if Precondition::of(stored) != expected || trip.seats < stored.booked_seats {
            return Ok(WriteOutcome::PreconditionFailed);
        }

        stored.origin = trip.origin.clone();
        stored.destination = trip.destination.clone();
        stored.departure_time = trip.departure_time;
        stored.seats = trip.seats;
        stored.status = trip.status;
        stored.updated_at = Utc::now();
        Ok(WriteOutcome::Applied(stored.clone()))
    }

    async fn advance_booking(
        &self,
        trip_id: Uuid,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut trips = self.trips.write().await;
        let Some(trip) = trips.get_mut(&trip_id).filter(|t| t.status == TripStatus::Active) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };
        let Some(booking) = trip.bookings.iter_mut().find(|b| b.id == booking_id && b.status == from) else {
            return Ok(WriteOutcome::PreconditionFailed);
        };

        booking.status = to;
        if trip.all_bookings_completed() {
            trip.status = TripStatus::Completed;
        }
        trip.updated_at = Utc::now();
        Ok(WriteOutcome::Applied(trip.clone()))
    }

    async fn delete_trip(&self, trip_id: Uuid, expected: Precondition) -> StoreResult<bool> {
        let mut trips = self.trips.write().await;
        match trips.get(&trip_id) {
            Some(trip) if Precondition::of(trip) == expected => {
                trips.remove(&trip_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_trips(&self, statuses: &[TripStatus]) -> StoreResult<Vec<Trip>> {
        let trips = self.trips.read().await;
        let mut matching: Vec<Trip> = trips.values().filter(|t| statuses.contains(&t.status)).cloned().collect();
        matching.sort_by_key(|t| (t.departure_time, t.id));
        Ok(matching)
    }

    async fn rider_bookings(&self, rider_id: &str) -> StoreResult<Vec<RiderBooking>> {
        let trips = self.trips.read().await;
        let mut bookings: Vec<RiderBooking> = trips
            .values()
            .flat_map(|trip| {
                trip.bookings.iter().filter(|b| b.rider_id == rider_id).map(|b| RiderBooking {
                    booking_id: b.id,
                    trip_id: trip.id,
                    origin: trip.origin.clone(),
                    destination: trip.destination.clone(),
                    departure_time: trip.departure_time,
                    trip_status: trip.status,
                    status: b.status,
                })
            })
            .collect();
        bookings.sort_by_key(|b| b.departure_time);
        Ok(bookings)
    }
}

/// Expiring key/value map. `set_offline(true)` makes every call fail, which is
/// how tests exercise cache outages.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    offline: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.get(key).is_some_and(|(_, expires)| *expires > Instant::now()))
            .unwrap_or(false)
    }

    fn entries(&self) -> CacheResult<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("cache offline".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("cache lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        let expires = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries()?.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<()> {
        let mut entries = self.entries()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.entries().map(|_| ())
    }
}

/// Keeps every delivered event so tests can assert on them.
#[derive(Default)]
pub struct InMemoryNotifier {
    events: Mutex<Vec<RideEvent>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<RideEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, event: &RideEvent) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("notifier offline".to_string()));
        }
        self.events
            .lock()
            .map_err(|_| NotifyError("event log poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
