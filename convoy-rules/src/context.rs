use chrono::{DateTime, Duration, Utc};
use convoy_core::{Booking, Rider, Trip, TripStatus};
use std::collections::BTreeMap;
use std::fmt;

/// Name of a context field a condition is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextField {
    BookingsCount,
    AvailableSeats,
    Status,
    TripStatus,
    DepartureTime,
    MinutesToDeparture,
    UserAlreadyBooked,
    UserBookingLimitReached,
    TimeConflict,
    /// A key the builder does not derive. Only matches values attached with
    /// [`Context::with_extra`].
    Other(String),
}

impl ContextField {
    pub fn parse(key: &str) -> Self {
        match key {
            "bookings_count" => ContextField::BookingsCount,
            "available_seats" => ContextField::AvailableSeats,
            "status" => ContextField::Status,
            "trip_status" => ContextField::TripStatus,
            "departure_time" => ContextField::DepartureTime,
            "minutes_to_departure" => ContextField::MinutesToDeparture,
            "user_already_booked" => ContextField::UserAlreadyBooked,
            "user_booking_limit_reached" => ContextField::UserBookingLimitReached,
            "time_conflict" => ContextField::TimeConflict,
            other => ContextField::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContextField::BookingsCount => "bookings_count",
            ContextField::AvailableSeats => "available_seats",
            ContextField::Status => "status",
            ContextField::TripStatus => "trip_status",
            ContextField::DepartureTime => "departure_time",
            ContextField::MinutesToDeparture => "minutes_to_departure",
            ContextField::UserAlreadyBooked => "user_already_booked",
            ContextField::UserBookingLimitReached => "user_booking_limit_reached",
            ContextField::TimeConflict => "time_conflict",
            ContextField::Other(name) => name,
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single context value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Time(DateTime<Utc>),
}

impl FieldValue {
    /// Numeric view used by comparison operators. Timestamps compare as epoch milliseconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Time(t) => Some(t.timestamp_millis() as f64),
            FieldValue::Bool(_) | FieldValue::Text(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Strict equality. Integers and floats compare numerically; every other
    /// pairing must be the same kind and value.
    pub fn matches(&self, expected: &FieldValue) -> bool {
        match (self, expected) {
            (FieldValue::Int(a), FieldValue::Float(b)) | (FieldValue::Float(b), FieldValue::Int(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<TripStatus> for FieldValue {
    fn from(value: TripStatus) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

impl From<convoy_core::BookingStatus> for FieldValue {
    fn from(value: convoy_core::BookingStatus) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

/// Flat snapshot of the facts one validation decision needs.
///
/// Built per call and never cached: `minutes_to_departure` and the rider
/// predicates are only true at `evaluated_at`.
#[derive(Debug, Clone)]
pub struct Context {
    pub bookings_count: u32,
    pub available_seats: u32,
    /// Trip status for trip actions, booking check-in status for booking actions.
    pub status: &'static str,
    pub trip_status: TripStatus,
    pub departure_time: DateTime<Utc>,
    pub minutes_to_departure: f64,
    pub user_already_booked: bool,
    pub user_booking_limit_reached: bool,
    pub time_conflict: bool,
    pub evaluated_at: DateTime<Utc>,
    pub actor: Option<String>,
    extras: BTreeMap<String, FieldValue>,
}

impl Context {
    pub fn get(&self, field: &ContextField) -> Option<FieldValue> {
        let value = match field {
            ContextField::BookingsCount => FieldValue::Int(i64::from(self.bookings_count)),
            ContextField::AvailableSeats => FieldValue::Int(i64::from(self.available_seats)),
            ContextField::Status => FieldValue::Text(self.status.to_string()),
            ContextField::TripStatus => self.trip_status.into(),
            ContextField::DepartureTime => FieldValue::Time(self.departure_time),
            ContextField::MinutesToDeparture => FieldValue::Float(self.minutes_to_departure),
            ContextField::UserAlreadyBooked => FieldValue::Bool(self.user_already_booked),
            ContextField::UserBookingLimitReached => FieldValue::Bool(self.user_booking_limit_reached),
            ContextField::TimeConflict => FieldValue::Bool(self.time_conflict),
            ContextField::Other(name) => return self.extras.get(name).cloned(),
        };
        Some(value)
    }

    /// Attach a value for a field the builder does not derive.
    pub fn with_extra(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// Limits behind the rider predicates of a booking request.
#[derive(Debug, Clone, Copy)]
pub struct ContextPolicy {
    pub booking_limit: usize,
    pub conflict_window: Duration,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            booking_limit: 5,
            conflict_window: Duration::minutes(120),
        }
    }
}

/// Pure mapping from domain entities to a [`Context`].
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    policy: ContextPolicy,
}

impl ContextBuilder {
    pub fn new(policy: ContextPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ContextPolicy {
        &self.policy
    }

    /// Context for trip actions (update, cancel, delete).
    pub fn from_trip(&self, trip: &Trip, actor: Option<&str>, now: DateTime<Utc>) -> Context {
        Self::base(trip, trip.status.as_str(), actor, now)
    }

    /// Context for actions on an existing booking.
    pub fn from_booking(
        &self,
        booking: &Booking,
        trip: &Trip,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Context {
        Self::base(trip, booking.status.as_str(), actor, now)
    }

    /// Context for a rider asking for a seat. `rider` must come from a fresh
    /// store read; the predicates it feeds decide whether a seat is handed out.
    pub fn for_booking_request(&self, trip: &Trip, rider: &Rider, now: DateTime<Utc>) -> Context {
        let mut context = Self::base(trip, trip.status.as_str(), Some(&rider.id), now);

        context.user_already_booked = trip.has_rider(&rider.id);
        context.user_booking_limit_reached = rider.active_count() >= self.policy.booking_limit;

        let window = self.policy.conflict_window.num_seconds();
        context.time_conflict = rider
            .active_bookings()
            .filter(|b| b.trip_id != trip.id)
            .any(|b| (b.departure_time - trip.departure_time).num_seconds().abs() < window);

        context
    }

    fn base(trip: &Trip, status: &'static str, actor: Option<&str>, now: DateTime<Utc>) -> Context {
        let minutes_to_departure = (trip.departure_time - now).num_milliseconds() as f64 / 60_000.0;

        Context {
            bookings_count: trip.bookings.len() as u32,
            available_seats: trip.available_seats(),
            status,
            trip_status: trip.status,
            departure_time: trip.departure_time,
            minutes_to_departure,
            user_already_booked: false,
            user_booking_limit_reached: false,
            time_conflict: false,
            evaluated_at: now,
            actor: actor.map(str::to_string),
            extras: BTreeMap::new(),
        }
    }
}
