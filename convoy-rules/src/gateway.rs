use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::condition::{ConditionEvaluator, EvalError};
use crate::context::Context;
use crate::error_code::ErrorCode;
use crate::registry::{Action, Entity, PostAction, Rule, RuleKey, RuleRegistry};

/// Outcome of validating one action against one context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub message: Option<String>,
    pub error_code: Option<ErrorCode>,
    #[serde(skip)]
    pub post_action: Option<PostAction>,
}

impl Decision {
    fn allow(post_action: Option<PostAction>) -> Self {
        Self {
            allowed: true,
            message: None,
            error_code: None,
            post_action,
        }
    }

    fn deny(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
            error_code: Some(code),
            post_action: None,
        }
    }

    /// Turn a denial into an error value carrying the action it was for.
    pub fn rejection(&self, key: RuleKey) -> Option<Rejection> {
        if self.allowed {
            return None;
        }
        Some(Rejection {
            action: key,
            code: self.error_code.unwrap_or(ErrorCode::ValidationError),
            message: self.message.clone().unwrap_or_default(),
        })
    }
}

/// A denied action, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{action} rejected ({code}): {message}")]
pub struct Rejection {
    pub action: RuleKey,
    pub code: ErrorCode,
    pub message: String,
}

impl Rejection {
    pub fn new(action: RuleKey, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            action,
            code,
            message: message.into(),
        }
    }
}

/// Decides whether an action may proceed. Fails closed: a missing rule or an
/// evaluation fault is a denial, never an allow.
#[derive(Debug, Clone)]
pub struct ValidationGateway {
    registry: Arc<RuleRegistry>,
}

impl ValidationGateway {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn validate(&self, entity: Entity, action: Action, context: &Context) -> Decision {
        let key = RuleKey::new(entity, action);

        let Some(rule) = self.registry.get(entity, action) else {
            warn!(action = %key, "no validation rule registered");
            return Decision::deny(ErrorCode::ValidationError, format!("No validation rule for {key}"));
        };

        let decision = match Self::decide(rule, context) {
            Ok(decision) => decision,
            Err(e) => {
                error!(action = %key, error = %e, "validation rule could not be evaluated");
                Decision::deny(ErrorCode::ValidationError, "Validation could not be completed")
            }
        };

        match decision.error_code {
            None => debug!(action = %key, "action allowed"),
            Some(code) => info!(action = %key, code = %code, "action denied"),
        }

        decision
    }

    fn decide(rule: &Rule, context: &Context) -> Result<Decision, EvalError> {
        for denial in &rule.denied_if {
            if ConditionEvaluator::evaluate(&denial.clause, context)? {
                return Ok(Decision::deny(denial.code, denial.message.clone()));
            }
        }

        for clause in &rule.allowed_if {
            if !ConditionEvaluator::evaluate(clause, context)? {
                return Ok(Decision::deny(
                    ErrorCode::BusinessRuleViolation,
                    format!("Requirement on `{}` is not met", clause.field),
                ));
            }
        }

        Ok(Decision::allow(rule.post_action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Clause, Operator};
    use crate::context::{ContextBuilder, ContextField};
    use crate::registry::DenyCondition;
    use chrono::{DateTime, Duration, Utc};
    use convoy_core::{Booking, BookingStatus, Rider, RiderBooking, Trip, TripStatus};
    use convoy_shared::RideEventKind;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn gateway() -> ValidationGateway {
        ValidationGateway::new(Arc::new(RuleRegistry::builtin()))
    }

    fn trip(now: DateTime<Utc>, departs_in: Duration, seats: u32, booked: u32) -> Trip {
        let mut trip = Trip::draft("agency-1", "Lyon", "Paris", now + departs_in, seats).unwrap();
        trip.status = TripStatus::Active;
        for i in 0..booked {
            trip.bookings.push(Booking::new(trip.id, format!("rider-{i}")));
        }
        trip.booked_seats = booked;
        trip
    }

    fn code(decision: &Decision) -> Option<ErrorCode> {
        decision.error_code
    }

    #[test]
    fn test_delete_trip_without_bookings_is_allowed() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(24), 4, 0), None, now);

        let decision = gateway().validate(Entity::Trip, Action::Delete, &ctx);

        assert!(decision.allowed);
        assert_eq!(decision.post_action, None);
    }

    #[test]
    fn test_delete_trip_with_bookings_is_denied() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(24), 4, 2), None, now);

        let decision = gateway().validate(Entity::Trip, Action::Delete, &ctx);

        assert!(!decision.allowed);
        assert_eq!(code(&decision), Some(ErrorCode::RideHasBookings));
    }

    #[test]
    fn test_full_trip_rejects_booking() {
        let now = Utc::now();
        let trip = trip(now, Duration::hours(2), 4, 4);
        let rider = Rider::new("rider-new", vec![]);
        let ctx = ContextBuilder::default().for_booking_request(&trip, &rider, now);

        let decision = gateway().validate(Entity::Booking, Action::Create, &ctx);

        assert_eq!(code(&decision), Some(ErrorCode::RideFullyBooked));
    }

    #[test]
    fn test_booking_cancel_too_close_to_departure() {
        let now = Utc::now();
        let trip = trip(now, Duration::minutes(15), 4, 1);
        let booking = trip.bookings[0].clone();
        let ctx = ContextBuilder::default().from_booking(&booking, &trip, None, now);

        let decision = gateway().validate(Entity::Booking, Action::Cancel, &ctx);

        assert_eq!(code(&decision), Some(ErrorCode::CancellationTooLate));
    }

    #[test]
    fn test_first_matching_denial_wins() {
        let now = Utc::now();
        // Canceled, departed and full: RIDE_CANCELED is listed first.
        let mut trip = trip(now, Duration::minutes(-20), 2, 2);
        trip.status = TripStatus::Canceled;
        let rider = Rider::new("rider-0", vec![]);
        let ctx = ContextBuilder::default().for_booking_request(&trip, &rider, now);

        assert_eq!(code(&gateway().validate(Entity::Booking, Action::Create, &ctx)), Some(ErrorCode::RideCanceled));

        // Same trip still active: full beats departed and already-booked.
        trip.status = TripStatus::Active;
        let ctx = ContextBuilder::default().for_booking_request(&trip, &rider, now);
        assert_eq!(code(&gateway().validate(Entity::Booking, Action::Create, &ctx)), Some(ErrorCode::RideFullyBooked));
    }

    #[test]
    fn test_cancel_trip_reports_departed_before_too_late() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::minutes(-5), 4, 0), None, now);

        let decision = gateway().validate(Entity::Trip, Action::Cancel, &ctx);

        assert_eq!(code(&decision), Some(ErrorCode::RideInPast));
    }

    #[test]
    fn test_cancel_trip_allowed_carries_status_change() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(3), 4, 1), None, now);

        let decision = gateway().validate(Entity::Trip, Action::Cancel, &ctx);

        assert!(decision.allowed);
        assert_eq!(decision.post_action, Some(PostAction::ChangeStatus(TripStatus::Canceled)));
    }

    #[test]
    fn test_update_window() {
        let now = Utc::now();
        let builder = ContextBuilder::default();

        let late = builder.from_trip(&trip(now, Duration::minutes(60), 4, 0), None, now);
        assert_eq!(code(&gateway().validate(Entity::Trip, Action::Update, &late)), Some(ErrorCode::UpdateTooLate));

        let early = builder.from_trip(&trip(now, Duration::minutes(61), 4, 0), None, now);
        let decision = gateway().validate(Entity::Trip, Action::Update, &early);
        assert!(decision.allowed);
        assert_eq!(decision.post_action, Some(PostAction::NotifyRiders(RideEventKind::TripUpdated)));
    }

    #[test]
    fn test_booking_create_rider_predicates() {
        let now = Utc::now();
        let builder = ContextBuilder::default();
        let trip = trip(now, Duration::hours(6), 4, 1);

        let repeat = Rider::new("rider-0", vec![]);
        let ctx = builder.for_booking_request(&trip, &repeat, now);
        assert_eq!(code(&gateway().validate(Entity::Booking, Action::Create, &ctx)), Some(ErrorCode::AlreadyBooked));

        let other = RiderBooking {
            booking_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            origin: "Nice".to_string(),
            destination: "Cannes".to_string(),
            departure_time: trip.departure_time - Duration::minutes(30),
            trip_status: TripStatus::Active,
            status: BookingStatus::Pending,
        };
        let busy = Rider::new("rider-9", vec![other]);
        let ctx = builder.for_booking_request(&trip, &busy, now);
        assert_eq!(code(&gateway().validate(Entity::Booking, Action::Create, &ctx)), Some(ErrorCode::TimeConflict));

        let fresh = Rider::new("rider-10", vec![]);
        let ctx = builder.for_booking_request(&trip, &fresh, now);
        assert!(gateway().validate(Entity::Booking, Action::Create, &ctx).allowed);
    }

    #[test]
    fn test_booking_create_closes_ten_minutes_out() {
        let now = Utc::now();
        let trip = trip(now, Duration::minutes(10), 4, 0);
        let ctx = ContextBuilder::default().for_booking_request(&trip, &Rider::new("r", vec![]), now);

        assert_eq!(code(&gateway().validate(Entity::Booking, Action::Create, &ctx)), Some(ErrorCode::BookingTooLate));
    }

    #[test]
    fn test_booking_cancel_after_check_in() {
        let now = Utc::now();
        let mut trip = trip(now, Duration::hours(4), 4, 1);
        trip.bookings[0].status = BookingStatus::CheckedIn;
        let booking = trip.bookings[0].clone();
        let ctx = ContextBuilder::default().from_booking(&booking, &trip, None, now);

        assert_eq!(
            code(&gateway().validate(Entity::Booking, Action::Cancel, &ctx)),
            Some(ErrorCode::BookingAlreadyCheckedIn)
        );
    }

    #[test]
    fn test_missing_rule_fails_closed() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(24), 4, 0), None, now);
        let empty = ValidationGateway::new(Arc::new(RuleRegistry::new(HashMap::new())));

        let decision = empty.validate(Entity::Trip, Action::Delete, &ctx);

        assert!(!decision.allowed);
        assert_eq!(code(&decision), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn test_evaluation_fault_fails_closed() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(24), 4, 0), None, now);

        let mut rules = HashMap::new();
        rules.insert(
            RuleKey::new(Entity::Trip, Action::Delete),
            Rule {
                allowed_if: vec![],
                denied_if: vec![DenyCondition {
                    clause: Clause::compare(ContextField::Status, Operator::GreaterThan, 0.0),
                    message: "unreachable".to_string(),
                    code: ErrorCode::RideInPast,
                }],
                post_action: None,
            },
        );
        let faulty = ValidationGateway::new(Arc::new(RuleRegistry::new(rules)));

        let decision = faulty.validate(Entity::Trip, Action::Delete, &ctx);

        assert!(!decision.allowed);
        assert_eq!(code(&decision), Some(ErrorCode::ValidationError));
    }

    #[test]
    fn test_allowed_if_failure_is_generic() {
        let now = Utc::now();
        let mut trip = trip(now, Duration::hours(24), 4, 0);
        trip.status = TripStatus::Pending;
        let ctx = ContextBuilder::default().from_trip(&trip, None, now);

        let decision = gateway().validate(Entity::Trip, Action::Delete, &ctx);

        assert_eq!(code(&decision), Some(ErrorCode::BusinessRuleViolation));
    }

    #[test]
    fn test_same_context_same_decision() {
        let now = Utc::now();
        let gateway = gateway();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::minutes(31), 4, 1), None, now);

        let first = gateway.validate(Entity::Trip, Action::Cancel, &ctx);
        let _ = gateway.validate(Entity::Trip, Action::Delete, &ctx);
        let _ = gateway.validate(Entity::Trip, Action::Update, &ctx);
        let again = gateway.validate(Entity::Trip, Action::Cancel, &ctx);

        assert_eq!(first, again);
        assert!(first.allowed);
    }

    #[test]
    fn test_rejection_carries_action() {
        let now = Utc::now();
        let ctx = ContextBuilder::default().from_trip(&trip(now, Duration::hours(24), 4, 2), None, now);
        let key = RuleKey::new(Entity::Trip, Action::Delete);

        let rejection = gateway().validate(Entity::Trip, Action::Delete, &ctx).rejection(key).unwrap();

        assert_eq!(rejection.code, ErrorCode::RideHasBookings);
        assert_eq!(rejection.action.to_string(), "trip.delete");
    }
}
