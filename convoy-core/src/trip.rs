use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Trip lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Pending,
    Active,
    Delayed,
    Canceled,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Active => "active",
            TripStatus::Delayed => "delayed",
            TripStatus::Canceled => "canceled",
            TripStatus::Completed => "completed",
        }
    }

    /// Trips riders can still see and hold seats on.
    pub fn is_running(&self) -> bool {
        matches!(self, TripStatus::Active | TripStatus::Delayed)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TripStatus::Pending),
            "active" => Ok(TripStatus::Active),
            "delayed" => Ok(TripStatus::Delayed),
            "canceled" => Ok(TripStatus::Canceled),
            "completed" => Ok(TripStatus::Completed),
            other => Err(CoreError::UnknownValue { kind: "trip status", value: other.to_string() }),
        }
    }
}

/// Booking check-in status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    CheckedIn,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "checked-in" => Ok(BookingStatus::CheckedIn),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(CoreError::UnknownValue { kind: "booking status", value: other.to_string() }),
        }
    }
}

/// A rider's reservation of one seat on a trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(trip_id: Uuid, rider_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            rider_id: rider_id.into(),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// A scheduled journey with finite seat capacity.
///
/// `booked_seats` is stored alongside `bookings` so the store can condition
/// writes on it; the two must agree after every accepted mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub operator_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats: u32,
    pub booked_seats: u32,
    pub status: TripStatus,
    pub bookings: Vec<Booking>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Largest capacity a trip may declare; seat counts are stored as `INTEGER`.
pub const MAX_SEATS: u32 = i32::MAX as u32;

impl Trip {
    /// Create a draft trip. Drafts are invisible to riders until published.
    pub fn draft(
        operator_id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_time: DateTime<Utc>,
        seats: u32,
    ) -> CoreResult<Self> {
        let origin = origin.into();
        let destination = destination.into();

        if seats == 0 {
            return Err(CoreError::ValidationError("a trip needs at least one seat".to_string()));
        }
        if seats > MAX_SEATS {
            return Err(CoreError::ValidationError(format!("a trip has at most {} seats", MAX_SEATS)));
        }
        if origin.trim().is_empty() || destination.trim().is_empty() {
            return Err(CoreError::ValidationError("origin and destination are required".to_string()));
        }
        if origin == destination {
            return Err(CoreError::ValidationError("origin and destination must differ".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            operator_id: operator_id.into(),
            origin,
            destination,
            departure_time,
            seats,
            booked_seats: 0,
            status: TripStatus::Pending,
            bookings: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn available_seats(&self) -> u32 {
        self.seats.saturating_sub(self.booked_seats)
    }

    pub fn booking(&self, booking_id: Uuid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == booking_id)
    }

    pub fn has_rider(&self, rider_id: &str) -> bool {
        self.bookings.iter().any(|b| b.rider_id == rider_id)
    }

    pub fn rider_ids(&self) -> Vec<String> {
        self.bookings.iter().map(|b| b.rider_id.clone()).collect()
    }

    /// Seat-count invariant: `booked_seats <= seats` and one booking per booked seat.
    pub fn is_consistent(&self) -> bool {
        self.booked_seats <= self.seats && self.booked_seats as usize == self.bookings.len()
    }

    /// True when the trip has bookings and every one of them is completed.
    pub fn all_bookings_completed(&self) -> bool {
        !self.bookings.is_empty()
            && self.bookings.iter().all(|b| b.status == BookingStatus::Completed)
    }
}
