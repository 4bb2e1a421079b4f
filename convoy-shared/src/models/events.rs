use chrono::Utc;
use uuid::Uuid;

use crate::pii::Masked;

/// What happened to a ride. Published to the notification bus after a mutation commits.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideEventKind {
    TripPublished,
    TripUpdated,
    TripCanceled,
    TripDeleted,
    TripCompleted,
    BookingCreated,
    BookingCanceled,
    BookingCheckedIn,
    BookingCompleted,
}

impl RideEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideEventKind::TripPublished => "TRIP_PUBLISHED",
            RideEventKind::TripUpdated => "TRIP_UPDATED",
            RideEventKind::TripCanceled => "TRIP_CANCELED",
            RideEventKind::TripDeleted => "TRIP_DELETED",
            RideEventKind::TripCompleted => "TRIP_COMPLETED",
            RideEventKind::BookingCreated => "BOOKING_CREATED",
            RideEventKind::BookingCanceled => "BOOKING_CANCELED",
            RideEventKind::BookingCheckedIn => "BOOKING_CHECKED_IN",
            RideEventKind::BookingCompleted => "BOOKING_COMPLETED",
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RideEvent {
    pub trip_id: Uuid,
    pub kind: RideEventKind,
    pub rider_ids: Vec<Masked<String>>,
    pub timestamp: i64,
}

impl RideEvent {
    pub fn new(trip_id: Uuid, kind: RideEventKind, rider_ids: Vec<String>) -> Self {
        Self {
            trip_id,
            kind,
            rider_ids: rider_ids.into_iter().map(Masked).collect(),
            timestamp: Utc::now().timestamp(),
        }
    }
}
