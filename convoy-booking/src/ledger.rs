use convoy_core::{Booking, Clock, Rider, Trip, TripRepository, WriteOutcome};
use convoy_rules::{Action, ContextBuilder, Entity, ErrorCode, PostAction, Rejection, RuleKey, ValidationGateway};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};

const BOOKING_CREATE: RuleKey = RuleKey::new(Entity::Booking, Action::Create);
const BOOKING_CANCEL: RuleKey = RuleKey::new(Entity::Booking, Action::Cancel);

/// A seat handed to a rider.
#[derive(Debug, Clone)]
pub struct Claim {
    pub trip: Trip,
    pub booking: Booking,
    pub post_action: Option<PostAction>,
}

/// A seat given back.
#[derive(Debug, Clone)]
pub struct Release {
    pub trip: Trip,
    pub booking: Booking,
    pub post_action: Option<PostAction>,
}

/// Owns the seat-count invariant. Every claim and release re-reads the trip,
/// validates against that read and writes conditioned on it, so a concurrent
/// writer makes the write fail instead of overbooking.
pub struct SeatLedger {
    store: Arc<dyn TripRepository>,
    gateway: ValidationGateway,
    contexts: ContextBuilder,
    clock: Arc<dyn Clock>,
}

impl SeatLedger {
    pub fn new(
        store: Arc<dyn TripRepository>,
        gateway: ValidationGateway,
        contexts: ContextBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            contexts,
            clock,
        }
    }

    /// Claim a seat, failing closed with `RIDE_FULLY_BOOKED` on a lost update.
    pub async fn claim(&self, trip_id: Uuid, rider_id: &str) -> BookingResult<Claim> {
        self.claim_with_retry(trip_id, rider_id, 0).await
    }

    /// Claim a seat, reloading and revalidating up to `retries` more times
    /// when a concurrent writer changes the trip first.
    pub async fn claim_with_retry(&self, trip_id: Uuid, rider_id: &str, retries: u32) -> BookingResult<Claim> {
        let mut attempt = 0;

        loop {
            let trip = self.load(trip_id).await?;
            let rider = Rider::new(rider_id, self.store.rider_bookings(rider_id).await?);
            let now = self.clock.now();

            let context = self.contexts.for_booking_request(&trip, &rider, now);
            let decision = self.gateway.validate(Entity::Booking, Action::Create, &context);
            if let Some(rejection) = decision.rejection(BOOKING_CREATE) {
                return Err(rejection.into());
            }

            let mut booking = Booking::new(trip.id, rider_id);
            booking.created_at = now;

            match self.store.push_booking(trip.id, trip.booked_seats, &booking).await? {
                WriteOutcome::Applied(trip) => {
                    info!("Seat claimed on trip {} by booking {} ({}/{})", trip.id, booking.id, trip.booked_seats, trip.seats);
                    return Ok(Claim {
                        trip,
                        booking,
                        post_action: decision.post_action,
                    });
                }
                WriteOutcome::PreconditionFailed if attempt < retries => {
                    attempt += 1;
                    warn!("Lost update on trip {}, retrying claim ({}/{})", trip_id, attempt, retries);
                }
                WriteOutcome::PreconditionFailed => {
                    warn!("Lost update on trip {}, claim rejected", trip_id);
                    return Err(Rejection::new(
                        BOOKING_CREATE,
                        ErrorCode::RideFullyBooked,
                        "This ride is fully booked.",
                    )
                    .into());
                }
            }
        }
    }

    /// Release a booking's seat. A lost update is re-read once: a booking
    /// that is gone by then is `NotFound`, otherwise the release is
    /// revalidated and retried once before surfacing `Conflict`.
    pub async fn release(&self, trip_id: Uuid, booking_id: Uuid, actor: Option<&str>) -> BookingResult<Release> {
        let mut retried = false;

        loop {
            let trip = self.load(trip_id).await?;
            let booking = trip
                .booking(booking_id)
                .cloned()
                .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id} on trip {trip_id}")))?;

            let context = self.contexts.from_booking(&booking, &trip, actor, self.clock.now());
            let decision = self.gateway.validate(Entity::Booking, Action::Cancel, &context);
            if let Some(rejection) = decision.rejection(BOOKING_CANCEL) {
                return Err(rejection.into());
            }

            match self.store.pull_booking(trip.id, trip.booked_seats, booking.id, booking.status).await? {
                WriteOutcome::Applied(trip) => {
                    info!("Seat released on trip {} by booking {}", trip.id, booking.id);
                    return Ok(Release {
                        trip,
                        booking,
                        post_action: decision.post_action,
                    });
                }
                WriteOutcome::PreconditionFailed if !retried => {
                    retried = true;
                    warn!("Lost update on trip {}, retrying release of {}", trip_id, booking_id);
                }
                WriteOutcome::PreconditionFailed => {
                    return Err(BookingError::Conflict(format!(
                        "trip {trip_id} kept changing while releasing booking {booking_id}"
                    )));
                }
            }
        }
    }

    async fn load(&self, trip_id: Uuid) -> BookingResult<Trip> {
        self.store
            .load_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("trip {trip_id}")))
    }
}
