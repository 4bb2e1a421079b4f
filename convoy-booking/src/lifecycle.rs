use convoy_core::{BookingStatus, TripStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Trip transitions: `pending → active` (publish), `active → canceled`,
/// `active → completed`. Everything else is rejected, including no-ops.
pub fn ensure_trip_transition(from: TripStatus, to: TripStatus) -> Result<(), LifecycleError> {
    match (from, to) {
        (TripStatus::Pending, TripStatus::Active)
        | (TripStatus::Active, TripStatus::Canceled)
        | (TripStatus::Active, TripStatus::Completed) => Ok(()),
        _ => Err(LifecycleError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Bookings only move forward one step at a time.
pub fn ensure_booking_advance(from: BookingStatus, to: BookingStatus) -> Result<(), LifecycleError> {
    match (from, to) {
        (BookingStatus::Pending, BookingStatus::CheckedIn) | (BookingStatus::CheckedIn, BookingStatus::Completed) => {
            Ok(())
        }
        _ => Err(LifecycleError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}
