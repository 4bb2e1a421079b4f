use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable reason attached to every denied decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RideHasBookings,
    RideAlreadyCanceled,
    RideInPast,
    CancellationTooLate,
    UpdateTooLate,
    RideCanceled,
    RideFullyBooked,
    RideAlreadyStarted,
    BookingTooLate,
    AlreadyBooked,
    BookingLimitReached,
    TimeConflict,
    BookingAlreadyCompleted,
    BookingAlreadyCheckedIn,
    /// An `allowed_if` requirement failed without any specific denial matching.
    BusinessRuleViolation,
    /// No rule for the action, or the rule could not be evaluated.
    ValidationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RideHasBookings => "RIDE_HAS_BOOKINGS",
            ErrorCode::RideAlreadyCanceled => "RIDE_ALREADY_CANCELED",
            ErrorCode::RideInPast => "RIDE_IN_PAST",
            ErrorCode::CancellationTooLate => "CANCELLATION_TOO_LATE",
            ErrorCode::UpdateTooLate => "UPDATE_TOO_LATE",
            ErrorCode::RideCanceled => "RIDE_CANCELED",
            ErrorCode::RideFullyBooked => "RIDE_FULLY_BOOKED",
            ErrorCode::RideAlreadyStarted => "RIDE_ALREADY_STARTED",
            ErrorCode::BookingTooLate => "BOOKING_TOO_LATE",
            ErrorCode::AlreadyBooked => "ALREADY_BOOKED",
            ErrorCode::BookingLimitReached => "BOOKING_LIMIT_REACHED",
            ErrorCode::TimeConflict => "TIME_CONFLICT",
            ErrorCode::BookingAlreadyCompleted => "BOOKING_ALREADY_COMPLETED",
            ErrorCode::BookingAlreadyCheckedIn => "BOOKING_ALREADY_CHECKED_IN",
            ErrorCode::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_matches_as_str() {
        for code in [
            ErrorCode::RideHasBookings,
            ErrorCode::BookingAlreadyCheckedIn,
            ErrorCode::TimeConflict,
            ErrorCode::ValidationError,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), code.as_str());
        }
    }
}
