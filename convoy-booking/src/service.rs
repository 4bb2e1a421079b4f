use chrono::{DateTime, Utc};
use convoy_catalog::{CacheCoordinator, RiderTrips, TripListing};
use convoy_core::{
    Booking, BookingStatus, Clock, Notifier, Precondition, Trip, TripRepository, TripStatus, WriteOutcome, MAX_SEATS,
};
use convoy_rules::{Action, ContextBuilder, Entity, PostAction, RuleKey, ValidationGateway};
use convoy_shared::{RideEvent, RideEventKind};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::ledger::{Claim, Release, SeatLedger};
use crate::lifecycle::{ensure_booking_advance, ensure_trip_transition};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats: u32,
}

/// Fields an operator may change on a published trip. Absent fields keep
/// their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripChanges {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
    pub seats: Option<u32>,
}

/// Orchestrates every mutation: fresh read, validation, conditional write,
/// cache invalidation, then the rule's post-action.
pub struct TripService {
    store: Arc<dyn TripRepository>,
    ledger: SeatLedger,
    gateway: ValidationGateway,
    contexts: ContextBuilder,
    cache: Arc<CacheCoordinator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    claim_retries: u32,
}

impl TripService {
    pub fn new(
        store: Arc<dyn TripRepository>,
        gateway: ValidationGateway,
        contexts: ContextBuilder,
        cache: Arc<CacheCoordinator>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = SeatLedger::new(store.clone(), gateway.clone(), contexts.clone(), clock.clone());
        Self {
            store,
            ledger,
            gateway,
            contexts,
            cache,
            notifier,
            clock,
            claim_retries: 0,
        }
    }

    /// Extra claim attempts after a lost update.
    pub fn with_claim_retries(mut self, retries: u32) -> Self {
        self.claim_retries = retries;
        self
    }

    pub async fn create_trip(&self, operator_id: &str, request: NewTrip) -> BookingResult<Trip> {
        if request.departure_time <= self.clock.now() {
            return Err(BookingError::Invalid("departure_time must be in the future".to_string()));
        }

        let trip = Trip::draft(operator_id, request.origin, request.destination, request.departure_time, request.seats)?;
        self.store.insert_trip(&trip).await?;

        info!("Trip {} drafted by {}", trip.id, operator_id);
        Ok(trip)
    }

    pub async fn publish_trip(&self, trip_id: Uuid) -> BookingResult<Trip> {
        let trip = self.load(trip_id).await?;
        ensure_trip_transition(trip.status, TripStatus::Active)?;
        if trip.departure_time <= self.clock.now() {
            return Err(BookingError::Invalid("cannot publish a trip that has already departed".to_string()));
        }

        let mut published = trip.clone();
        published.status = TripStatus::Active;
        let published = self.write_trip(&published, Precondition::of(&trip)).await?;

        info!("Trip {} published", published.id);
        self.cache.invalidate(&[]).await;
        self.notify(&published, RideEventKind::TripPublished, Vec::new()).await;
        Ok(published)
    }

    pub async fn update_trip(&self, trip_id: Uuid, changes: TripChanges, actor: Option<&str>) -> BookingResult<Trip> {
        let trip = self.load(trip_id).await?;
        let post_action = self.authorize(Entity::Trip, Action::Update, &trip, actor)?;

        let mut updated = trip.clone();
        if let Some(origin) = changes.origin {
            updated.origin = origin;
        }
        if let Some(destination) = changes.destination {
            updated.destination = destination;
        }
        if let Some(departure_time) = changes.departure_time {
            if departure_time <= self.clock.now() {
                return Err(BookingError::Invalid("departure_time must be in the future".to_string()));
            }
            updated.departure_time = departure_time;
        }
        if let Some(seats) = changes.seats {
            if seats == 0 || seats > MAX_SEATS || seats < trip.booked_seats {
                return Err(BookingError::Invalid(format!(
                    "seats must be between 1 and {} and cover the {} booked seats",
                    MAX_SEATS, trip.booked_seats
                )));
            }
            updated.seats = seats;
        }
        if updated.origin.trim().is_empty() || updated.destination.trim().is_empty() || updated.origin == updated.destination {
            return Err(BookingError::Invalid("origin and destination must be set and differ".to_string()));
        }

        let updated = self.write_trip(&updated, Precondition::of(&trip)).await?;

        info!("Trip {} updated", updated.id);
        self.cache.invalidate(&updated.rider_ids()).await;
        self.run_post_action(post_action, updated, None).await
    }

    pub async fn cancel_trip(&self, trip_id: Uuid, actor: Option<&str>) -> BookingResult<Trip> {
        let trip = self.load(trip_id).await?;
        let post_action = self.authorize(Entity::Trip, Action::Cancel, &trip, actor)?;
        ensure_trip_transition(trip.status, TripStatus::Canceled)?;

        let mut canceled = trip.clone();
        canceled.status = TripStatus::Canceled;
        let canceled = self.write_trip(&canceled, Precondition::of(&trip)).await?;

        info!("Trip {} canceled with {} booked riders", canceled.id, canceled.bookings.len());
        self.cache.invalidate(&canceled.rider_ids()).await;
        self.run_post_action(post_action, canceled, None).await
    }

    pub async fn delete_trip(&self, trip_id: Uuid, actor: Option<&str>) -> BookingResult<()> {
        let trip = self.load(trip_id).await?;
        let post_action = self.authorize(Entity::Trip, Action::Delete, &trip, actor)?;

        if !self.store.delete_trip(trip.id, Precondition::of(&trip)).await? {
            return Err(BookingError::Conflict(format!("trip {trip_id} changed before it could be deleted")));
        }

        info!("Trip {} deleted", trip.id);
        self.cache.invalidate(&trip.rider_ids()).await;
        self.notify(&trip, RideEventKind::TripDeleted, trip.rider_ids()).await;
        self.run_post_action(post_action, trip, None).await?;
        Ok(())
    }

    pub async fn book_seat(&self, trip_id: Uuid, rider_id: &str) -> BookingResult<Claim> {
        let mut claim = self.ledger.claim_with_retry(trip_id, rider_id, self.claim_retries).await?;

        self.cache.invalidate(&[claim.booking.rider_id.clone()]).await;
        claim.trip = self
            .run_post_action(claim.post_action, claim.trip, Some(&claim.booking))
            .await?;
        Ok(claim)
    }

    pub async fn cancel_booking(&self, trip_id: Uuid, booking_id: Uuid, actor: Option<&str>) -> BookingResult<Release> {
        let mut release = self.ledger.release(trip_id, booking_id, actor).await?;

        self.cache.invalidate(&[release.booking.rider_id.clone()]).await;
        release.trip = self
            .run_post_action(release.post_action, release.trip, Some(&release.booking))
            .await?;
        Ok(release)
    }

    pub async fn check_in(&self, trip_id: Uuid, booking_id: Uuid) -> BookingResult<Trip> {
        self.advance(trip_id, booking_id, BookingStatus::CheckedIn).await
    }

    /// Complete a checked-in booking. Completing the last one completes the trip.
    pub async fn complete_booking(&self, trip_id: Uuid, booking_id: Uuid) -> BookingResult<Trip> {
        self.advance(trip_id, booking_id, BookingStatus::Completed).await
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> BookingResult<Trip> {
        self.load(trip_id).await
    }

    pub async fn listing(&self) -> BookingResult<Vec<TripListing>> {
        Ok(self.cache.listing().await?)
    }

    pub async fn rider_trips(&self, rider_id: &str) -> BookingResult<RiderTrips> {
        Ok(self.cache.rider_trips(rider_id).await?)
    }

    pub async fn warm_cache(&self) -> BookingResult<usize> {
        Ok(self.cache.warm().await?)
    }

    async fn advance(&self, trip_id: Uuid, booking_id: Uuid, to: BookingStatus) -> BookingResult<Trip> {
        let trip = self.load(trip_id).await?;
        let booking = trip
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id} on trip {trip_id}")))?;
        ensure_booking_advance(booking.status, to)?;
        if trip.status != TripStatus::Active {
            return Err(BookingError::Invalid(format!("trip {trip_id} is {}", trip.status)));
        }

        let trip = match self.store.advance_booking(trip_id, booking_id, booking.status, to).await? {
            WriteOutcome::Applied(trip) => trip,
            WriteOutcome::PreconditionFailed => {
                return Err(BookingError::Conflict(format!("booking {booking_id} changed concurrently")));
            }
        };

        info!("Booking {} on trip {} is now {}", booking_id, trip_id, to);
        self.cache.invalidate(&trip.rider_ids()).await;

        let kind = match to {
            BookingStatus::CheckedIn => RideEventKind::BookingCheckedIn,
            _ => RideEventKind::BookingCompleted,
        };
        self.notify(&trip, kind, vec![booking.rider_id.clone()]).await;
        if trip.status == TripStatus::Completed {
            info!("Trip {} completed", trip.id);
            self.notify(&trip, RideEventKind::TripCompleted, trip.rider_ids()).await;
        }
        Ok(trip)
    }

    /// Validate against a context built from the trip just loaded.
    fn authorize(&self, entity: Entity, action: Action, trip: &Trip, actor: Option<&str>) -> BookingResult<Option<PostAction>> {
        let context = self.contexts.from_trip(trip, actor, self.clock.now());
        let decision = self.gateway.validate(entity, action, &context);
        match decision.rejection(RuleKey::new(entity, action)) {
            Some(rejection) => Err(rejection.into()),
            None => Ok(decision.post_action),
        }
    }

    /// Runs after the primary write committed. A failed status change or
    /// notification is logged; the committed mutation stands either way.
    async fn run_post_action(
        &self,
        action: Option<PostAction>,
        trip: Trip,
        booking: Option<&Booking>,
    ) -> BookingResult<Trip> {
        let riders = match booking {
            Some(b) => vec![b.rider_id.clone()],
            None => trip.rider_ids(),
        };

        match action {
            None => Ok(trip),
            Some(PostAction::NotifyRiders(kind)) => {
                self.notify(&trip, kind, riders).await;
                Ok(trip)
            }
            Some(PostAction::ChangeStatus(target)) => {
                let trip = if trip.status == target {
                    trip
                } else {
                    match self.change_status(&trip, target).await {
                        Ok(changed) => changed,
                        Err(e) => {
                            warn!("Post-action status change of trip {} to {} failed: {}", trip.id, target, e);
                            return Ok(trip);
                        }
                    }
                };
                self.notify(&trip, status_event(target), riders).await;
                Ok(trip)
            }
        }
    }

    async fn change_status(&self, trip: &Trip, target: TripStatus) -> BookingResult<Trip> {
        ensure_trip_transition(trip.status, target)?;
        let mut changed = trip.clone();
        changed.status = target;
        let changed = self.write_trip(&changed, Precondition::of(trip)).await?;
        self.cache.invalidate(&changed.rider_ids()).await;
        Ok(changed)
    }

    async fn write_trip(&self, trip: &Trip, expected: Precondition) -> BookingResult<Trip> {
        match self.store.update_trip(trip, expected).await? {
            WriteOutcome::Applied(trip) => Ok(trip),
            WriteOutcome::PreconditionFailed => Err(BookingError::Conflict(format!(
                "trip {} changed concurrently, reload and retry",
                trip.id
            ))),
        }
    }

    async fn notify(&self, trip: &Trip, kind: RideEventKind, riders: Vec<String>) {
        let event = RideEvent::new(trip.id, kind, riders);
        if let Err(e) = self.notifier.notify(&event).await {
            warn!("Notification {} for trip {} not delivered: {}", kind.as_str(), trip.id, e);
        }
    }

    async fn load(&self, trip_id: Uuid) -> BookingResult<Trip> {
        self.store
            .load_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("trip {trip_id}")))
    }
}

fn status_event(status: TripStatus) -> RideEventKind {
    match status {
        TripStatus::Canceled => RideEventKind::TripCanceled,
        TripStatus::Completed => RideEventKind::TripCompleted,
        TripStatus::Active => RideEventKind::TripPublished,
        TripStatus::Pending | TripStatus::Delayed => RideEventKind::TripUpdated,
    }
}
