use async_trait::async_trait;
use uuid::Uuid;

use crate::rider::RiderBooking;
use crate::trip::{Booking, BookingStatus, Trip, TripStatus};
use crate::StoreResult;

/// Prior state a conditional write expects to find. A write whose
/// precondition no longer holds is not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    pub booked_seats: u32,
    pub status: TripStatus,
}

impl Precondition {
    pub fn of(trip: &Trip) -> Self {
        Self {
            booked_seats: trip.booked_seats,
            status: trip.status,
        }
    }
}

/// Result of an atomic conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write committed; carries the post-write document.
    Applied(Trip),
    /// A concurrent writer changed the document first. Nothing was written.
    PreconditionFailed,
}

/// Persistent store for trips and their bookings.
///
/// Every mutating call is a single atomic unit conditioned on prior state, so
/// two requests racing for the last seat cannot both commit.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn load_trip(&self, id: Uuid) -> StoreResult<Option<Trip>>;

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()>;

    /// Append `booking` and increment `booked_seats`, provided the trip is
    /// still active, `booked_seats == expected_booked` and a seat is free.
    async fn push_booking(
        &self,
        trip_id: Uuid,
        expected_booked: u32,
        booking: &Booking,
    ) -> StoreResult<WriteOutcome>;

    /// Remove the booking and decrement `booked_seats`, provided the booking
    /// is present with status `expected_status` and `booked_seats ==
    /// expected_booked`.
    async fn pull_booking(
        &self,
        trip_id: Uuid,
        expected_booked: u32,
        booking_id: Uuid,
        expected_status: BookingStatus,
    ) -> StoreResult<WriteOutcome>;

    /// Overwrite route, departure, capacity and status. Bookings and the
    /// seat counter are never touched by this call.
    async fn update_trip(&self, trip: &Trip, expected: Precondition) -> StoreResult<WriteOutcome>;

    /// Move a booking from `from` to `to` on an active trip. When this leaves
    /// every booking completed the trip becomes completed in the same write.
    async fn advance_booking(
        &self,
        trip_id: Uuid,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<WriteOutcome>;

    /// Delete the trip. Returns false if the precondition no longer holds.
    async fn delete_trip(&self, trip_id: Uuid, expected: Precondition) -> StoreResult<bool>;

    async fn list_trips(&self, statuses: &[TripStatus]) -> StoreResult<Vec<Trip>>;

    async fn rider_bookings(&self, rider_id: &str) -> StoreResult<Vec<RiderBooking>>;
}
