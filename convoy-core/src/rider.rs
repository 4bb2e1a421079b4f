use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trip::{BookingStatus, TripStatus};

/// One of a rider's bookings, joined with the trip fields the rider view and
/// the booking predicates need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiderBooking {
    pub booking_id: Uuid,
    pub trip_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub trip_status: TripStatus,
    pub status: BookingStatus,
}

impl RiderBooking {
    /// A booking still holding the rider's time: its trip is running and the
    /// ride itself is not over.
    pub fn is_active(&self) -> bool {
        self.trip_status.is_running() && self.status != BookingStatus::Completed
    }
}

/// A rider identity with every booking read fresh from the store.
#[derive(Debug, Clone)]
pub struct Rider {
    pub id: String,
    pub bookings: Vec<RiderBooking>,
}

impl Rider {
    pub fn new(id: impl Into<String>, bookings: Vec<RiderBooking>) -> Self {
        Self { id: id.into(), bookings }
    }

    pub fn active_bookings(&self) -> impl Iterator<Item = &RiderBooking> {
        self.bookings.iter().filter(|b| b.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_bookings().count()
    }
}
