use chrono::{DateTime, Utc};
use convoy_core::{RiderBooking, Trip, TripStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public listing row for a bookable trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripListing {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats: u32,
    pub available_seats: u32,
    pub status: TripStatus,
}

impl TripListing {
    /// Statuses the listing is rebuilt from.
    pub const STATUSES: [TripStatus; 2] = [TripStatus::Active, TripStatus::Delayed];

    pub fn from_trip(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            departure_time: trip.departure_time,
            seats: trip.seats,
            available_seats: trip.available_seats(),
            status: trip.status,
        }
    }

    /// Running trips that have not departed at `now`, soonest first.
    pub fn build(trips: &[Trip], now: DateTime<Utc>) -> Vec<Self> {
        let mut listing: Vec<Self> = trips
            .iter()
            .filter(|t| t.status.is_running() && t.departure_time > now)
            .map(Self::from_trip)
            .collect();
        listing.sort_by_key(|l| (l.departure_time, l.id));
        listing
    }
}

/// A rider's booked trips, soonest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiderTrips {
    pub rider_id: String,
    pub trips: Vec<RiderBooking>,
}

impl RiderTrips {
    pub fn new(rider_id: impl Into<String>, mut trips: Vec<RiderBooking>) -> Self {
        trips.sort_by_key(|b| b.departure_time);
        Self {
            rider_id: rider_id.into(),
            trips,
        }
    }
}
