use convoy_core::TripStatus;
use convoy_shared::RideEventKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::condition::{Clause, Comparison, Condition, Operator, SpecialToken};
use crate::context::{ContextField, FieldValue};
use crate::error_code::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Trip,
    Booking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Cancel,
    Delete,
}

/// `(entity, action)` pair a rule is registered under, written `entity.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub entity: Entity,
    pub action: Action,
}

impl RuleKey {
    pub const fn new(entity: Entity, action: Action) -> Self {
        Self { entity, action }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (entity, action) = raw.split_once('.')?;
        let entity = match entity {
            "trip" => Entity::Trip,
            "booking" => Entity::Booking,
            _ => return None,
        };
        let action = match action {
            "create" => Action::Create,
            "update" => Action::Update,
            "cancel" => Action::Cancel,
            "delete" => Action::Delete,
            _ => return None,
        };
        Some(Self::new(entity, action))
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = match self.entity {
            Entity::Trip => "trip",
            Entity::Booking => "booking",
        };
        let action = match self.action {
            Action::Create => "create",
            Action::Update => "update",
            Action::Cancel => "cancel",
            Action::Delete => "delete",
        };
        write!(f, "{entity}.{action}")
    }
}

/// Side effect the caller runs once the mutation has committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAction {
    /// Tell every rider on the trip.
    NotifyRiders(RideEventKind),
    /// Make sure the trip ends up in this status, then tell its riders.
    ChangeStatus(TripStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenyCondition {
    pub clause: Clause,
    pub message: String,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Conjunction; checked only after no denial matched.
    pub allowed_if: Vec<Clause>,
    /// First match wins, so specific reasons must precede generic ones.
    pub denied_if: Vec<DenyCondition>,
    pub post_action: Option<PostAction>,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("cannot read rule file: {0}")]
    Io(#[from] std::io::Error),
    #[error("rule document is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown rule key `{0}`")]
    UnknownRule(String),
    #[error("rule `{rule}`, field `{field}`: {reason}")]
    InvalidCondition {
        rule: String,
        field: String,
        reason: String,
    },
}

/// Immutable table of rules, populated once at startup.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: HashMap<RuleKey, Rule>,
}

impl RuleRegistry {
    pub fn new(rules: HashMap<RuleKey, Rule>) -> Self {
        Self { rules }
    }

    pub fn get(&self, entity: Entity, action: Action) -> Option<&Rule> {
        self.rules.get(&RuleKey::new(entity, action))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The marketplace's standard policy.
    pub fn builtin() -> Self {
        use ContextField as F;

        let deny = |clause: Clause, code: ErrorCode, message: &str| DenyCondition {
            clause,
            code,
            message: message.to_string(),
        };
        let in_future = Clause::token(F::DepartureTime, SpecialToken::InFuture);
        let in_past = || Clause::token(F::DepartureTime, SpecialToken::InPast);
        let lead_over = |minutes| Clause::minutes_from_now(F::DepartureTime, Operator::GreaterThan, minutes);
        let lead_within = |minutes| Clause::minutes_from_now(F::DepartureTime, Operator::LessThanOrEqual, minutes);

        let mut rules = HashMap::new();

        rules.insert(
            RuleKey::new(Entity::Trip, Action::Delete),
            Rule {
                allowed_if: vec![
                    Clause::equals(F::BookingsCount, 0),
                    Clause::equals(F::Status, TripStatus::Active),
                    in_future,
                ],
                denied_if: vec![
                    deny(
                        Clause::compare(F::BookingsCount, Operator::GreaterThan, 0.0),
                        ErrorCode::RideHasBookings,
                        "This ride has bookings and cannot be deleted. Cancel it instead.",
                    ),
                    deny(
                        Clause::equals(F::Status, TripStatus::Canceled),
                        ErrorCode::RideAlreadyCanceled,
                        "This ride has already been canceled.",
                    ),
                    deny(in_past(), ErrorCode::RideInPast, "Rides that have already departed cannot be deleted."),
                ],
                post_action: None,
            },
        );

        rules.insert(
            RuleKey::new(Entity::Trip, Action::Cancel),
            Rule {
                allowed_if: vec![lead_over(30.0), Clause::equals(F::Status, TripStatus::Active)],
                denied_if: vec![
                    deny(
                        Clause::equals(F::Status, TripStatus::Canceled),
                        ErrorCode::RideAlreadyCanceled,
                        "This ride has already been canceled.",
                    ),
                    deny(in_past(), ErrorCode::RideInPast, "Rides that have already departed cannot be canceled."),
                    deny(
                        lead_within(30.0),
                        ErrorCode::CancellationTooLate,
                        "Rides cannot be canceled less than 30 minutes before departure.",
                    ),
                ],
                post_action: Some(PostAction::ChangeStatus(TripStatus::Canceled)),
            },
        );

        rules.insert(
            RuleKey::new(Entity::Trip, Action::Update),
            Rule {
                allowed_if: vec![Clause::equals(F::Status, TripStatus::Active), lead_over(60.0)],
                denied_if: vec![
                    deny(
                        Clause::equals(F::Status, TripStatus::Canceled),
                        ErrorCode::RideAlreadyCanceled,
                        "Canceled rides cannot be modified.",
                    ),
                    deny(
                        lead_within(60.0),
                        ErrorCode::UpdateTooLate,
                        "Rides cannot be modified less than 1 hour before departure.",
                    ),
                ],
                post_action: Some(PostAction::NotifyRiders(RideEventKind::TripUpdated)),
            },
        );

        rules.insert(
            RuleKey::new(Entity::Booking, Action::Create),
            Rule {
                allowed_if: vec![
                    Clause::equals(F::TripStatus, TripStatus::Active),
                    Clause::compare(F::AvailableSeats, Operator::GreaterThan, 0.0),
                    lead_over(10.0),
                    Clause::equals(F::UserAlreadyBooked, false),
                    Clause::equals(F::UserBookingLimitReached, false),
                    Clause::equals(F::TimeConflict, false),
                ],
                denied_if: vec![
                    deny(
                        Clause::equals(F::TripStatus, TripStatus::Canceled),
                        ErrorCode::RideCanceled,
                        "This ride has been canceled.",
                    ),
                    deny(
                        Clause::equals(F::AvailableSeats, 0),
                        ErrorCode::RideFullyBooked,
                        "This ride is fully booked.",
                    ),
                    deny(in_past(), ErrorCode::RideAlreadyStarted, "This ride has already departed."),
                    deny(
                        lead_within(10.0),
                        ErrorCode::BookingTooLate,
                        "Bookings close 10 minutes before departure.",
                    ),
                    deny(
                        Clause::equals(F::UserAlreadyBooked, true),
                        ErrorCode::AlreadyBooked,
                        "You already have a seat on this ride.",
                    ),
                    deny(
                        Clause::equals(F::UserBookingLimitReached, true),
                        ErrorCode::BookingLimitReached,
                        "You have reached the maximum number of active bookings.",
                    ),
                    deny(
                        Clause::equals(F::TimeConflict, true),
                        ErrorCode::TimeConflict,
                        "You already have a ride departing within 2 hours of this one.",
                    ),
                ],
                post_action: Some(PostAction::NotifyRiders(RideEventKind::BookingCreated)),
            },
        );

        rules.insert(
            RuleKey::new(Entity::Booking, Action::Cancel),
            Rule {
                allowed_if: vec![
                    lead_over(30.0),
                    Clause::equals(F::Status, convoy_core::BookingStatus::Pending),
                    Clause::equals(F::TripStatus, TripStatus::Active),
                ],
                denied_if: vec![
                    deny(
                        lead_within(30.0),
                        ErrorCode::CancellationTooLate,
                        "Bookings cannot be canceled less than 30 minutes before departure.",
                    ),
                    deny(
                        Clause::equals(F::Status, convoy_core::BookingStatus::Completed),
                        ErrorCode::BookingAlreadyCompleted,
                        "This booking is already completed.",
                    ),
                    deny(
                        Clause::equals(F::Status, convoy_core::BookingStatus::CheckedIn),
                        ErrorCode::BookingAlreadyCheckedIn,
                        "You have already checked in for this ride.",
                    ),
                    deny(
                        Clause::equals(F::TripStatus, TripStatus::Canceled),
                        ErrorCode::RideCanceled,
                        "This ride has been canceled.",
                    ),
                ],
                post_action: Some(PostAction::NotifyRiders(RideEventKind::BookingCanceled)),
            },
        );

        Self { rules }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Load a rule table from its JSON form:
    ///
    /// ```json
    /// { "trip.delete": {
    ///     "allowed_if": { "bookings_count": 0, "departure_time": "in_future" },
    ///     "denied_if": [ { "condition": { "bookings_count": { "greater_than": 0 } },
    ///                      "message": "...", "code": "RIDE_HAS_BOOKINGS" } ],
    ///     "post_action": null } }
    /// ```
    ///
    /// Conditions and codes are typed here; a malformed entry fails the load.
    pub fn from_json_str(raw: &str) -> Result<Self, RuleLoadError> {
        let document: HashMap<String, RawRule> = serde_json::from_str(raw)?;
        let mut rules = HashMap::with_capacity(document.len());

        for (name, raw_rule) in document {
            let key = RuleKey::parse(&name).ok_or_else(|| RuleLoadError::UnknownRule(name.clone()))?;

            let allowed_if = raw_rule
                .allowed_if
                .iter()
                .map(|(field, value)| parse_clause(&name, field, value))
                .collect::<Result<Vec<_>, _>>()?;

            let mut denied_if = Vec::with_capacity(raw_rule.denied_if.len());
            for denial in raw_rule.denied_if {
                let mut entries = denial.condition.iter();
                let (field, value) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => {
                        return Err(RuleLoadError::InvalidCondition {
                            rule: name.clone(),
                            field: denial.code.to_string(),
                            reason: "a denial must name exactly one field".to_string(),
                        })
                    }
                };
                denied_if.push(DenyCondition {
                    clause: parse_clause(&name, field, value)?,
                    message: denial.message,
                    code: denial.code,
                });
            }

            rules.insert(
                key,
                Rule {
                    allowed_if,
                    denied_if,
                    post_action: raw_rule.post_action,
                },
            );
        }

        Ok(Self { rules })
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    allowed_if: Map<String, Value>,
    #[serde(default)]
    denied_if: Vec<RawDenial>,
    #[serde(default)]
    post_action: Option<PostAction>,
}

#[derive(Debug, Deserialize)]
struct RawDenial {
    condition: Map<String, Value>,
    message: String,
    code: ErrorCode,
}

fn parse_clause(rule: &str, field: &str, value: &Value) -> Result<Clause, RuleLoadError> {
    let invalid = |reason: &str| RuleLoadError::InvalidCondition {
        rule: rule.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let condition = match value {
        Value::String(s) if s == "in_future" => Condition::Token(SpecialToken::InFuture),
        Value::String(s) if s == "in_past" => Condition::Token(SpecialToken::InPast),
        Value::String(s) => Condition::Equals(FieldValue::Text(s.clone())),
        Value::Bool(b) => Condition::Equals(FieldValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Condition::Equals(FieldValue::Int(i)),
            None => Condition::Equals(FieldValue::Float(n.as_f64().ok_or_else(|| invalid("number out of range"))?)),
        },
        Value::Object(map) => match map.get("minutes_from_now") {
            Some(Value::Object(inner)) if map.len() == 1 => {
                Condition::MinutesFromNow(parse_comparisons(inner).map_err(|r| invalid(&r))?)
            }
            Some(_) => return Err(invalid("`minutes_from_now` must be the only key and hold an object")),
            None => Condition::Compare(parse_comparisons(map).map_err(|r| invalid(&r))?),
        },
        Value::Null | Value::Array(_) => return Err(invalid("expected a literal, token or comparison object")),
    };

    Ok(Clause::new(ContextField::parse(field), condition))
}

fn parse_comparisons(map: &Map<String, Value>) -> Result<Vec<Comparison>, String> {
    if map.is_empty() {
        return Err("comparison object has no operators".to_string());
    }
    map.iter()
        .map(|(key, operand)| {
            let op = Operator::from_key(key).ok_or_else(|| format!("unknown operator `{key}`"))?;
            let operand = operand
                .as_f64()
                .ok_or_else(|| format!("operand of `{key}` must be a number"))?;
            Ok(Comparison::new(op, operand))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_action() {
        let registry = RuleRegistry::builtin();

        assert_eq!(registry.len(), 5);
        assert!(registry.get(Entity::Trip, Action::Delete).is_some());
        assert!(registry.get(Entity::Trip, Action::Cancel).is_some());
        assert!(registry.get(Entity::Trip, Action::Update).is_some());
        assert!(registry.get(Entity::Booking, Action::Create).is_some());
        assert!(registry.get(Entity::Booking, Action::Cancel).is_some());
        assert!(registry.get(Entity::Trip, Action::Create).is_none());
    }

    #[test]
    fn test_builtin_denial_order() {
        let registry = RuleRegistry::builtin();
        let codes: Vec<ErrorCode> = registry
            .get(Entity::Booking, Action::Create)
            .unwrap()
            .denied_if
            .iter()
            .map(|d| d.code)
            .collect();

        assert_eq!(
            codes,
            vec![
                ErrorCode::RideCanceled,
                ErrorCode::RideFullyBooked,
                ErrorCode::RideAlreadyStarted,
                ErrorCode::BookingTooLate,
                ErrorCode::AlreadyBooked,
                ErrorCode::BookingLimitReached,
                ErrorCode::TimeConflict,
            ]
        );
    }

    #[test]
    fn test_rule_key_round_trip() {
        let key = RuleKey::parse("booking.cancel").unwrap();
        assert_eq!(key, RuleKey::new(Entity::Booking, Action::Cancel));
        assert_eq!(key.to_string(), "booking.cancel");
        assert!(RuleKey::parse("driver.cancel").is_none());
        assert!(RuleKey::parse("trip").is_none());
    }

    #[test]
    fn test_load_types_conditions() {
        let registry = RuleRegistry::from_json_str(
            r#"{
                "trip.cancel": {
                    "allowed_if": {
                        "status": "active",
                        "departure_time": { "minutes_from_now": { "greater_than": 45 } }
                    },
                    "denied_if": [
                        { "condition": { "departure_time": "in_past" }, "message": "gone", "code": "RIDE_IN_PAST" },
                        { "condition": { "bookings_count": { "greater_than_or_equal": 3 } }, "message": "busy", "code": "RIDE_HAS_BOOKINGS" }
                    ],
                    "post_action": { "notify_riders": "TRIP_CANCELED" }
                }
            }"#,
        )
        .unwrap();

        let rule = registry.get(Entity::Trip, Action::Cancel).unwrap();
        assert_eq!(rule.post_action, Some(PostAction::NotifyRiders(RideEventKind::TripCanceled)));
        assert_eq!(rule.denied_if[0].clause, Clause::token(ContextField::DepartureTime, SpecialToken::InPast));
        assert_eq!(
            rule.denied_if[1].clause,
            Clause::compare(ContextField::BookingsCount, Operator::GreaterThanOrEqual, 3.0)
        );
        assert!(rule.allowed_if.contains(&Clause::minutes_from_now(
            ContextField::DepartureTime,
            Operator::GreaterThan,
            45.0
        )));
    }

    #[test]
    fn test_load_keeps_unknown_fields() {
        let registry = RuleRegistry::from_json_str(
            r#"{ "trip.update": { "allowed_if": { "vehicle_class": "van" } } }"#,
        )
        .unwrap();

        let rule = registry.get(Entity::Trip, Action::Update).unwrap();
        assert_eq!(rule.allowed_if[0].field, ContextField::Other("vehicle_class".to_string()));
        assert!(rule.denied_if.is_empty());
    }

    #[test]
    fn test_load_rejects_malformed_rules() {
        assert!(matches!(
            RuleRegistry::from_json_str(r#"{ "trip.fly": {} }"#),
            Err(RuleLoadError::UnknownRule(_))
        ));
        assert!(matches!(
            RuleRegistry::from_json_str(r#"{ "trip.delete": { "allowed_if": { "seats": { "about": 3 } } } }"#),
            Err(RuleLoadError::InvalidCondition { .. })
        ));
        assert!(matches!(
            RuleRegistry::from_json_str(
                r#"{ "trip.delete": { "denied_if": [ { "condition": {}, "message": "x", "code": "RIDE_IN_PAST" } ] } }"#
            ),
            Err(RuleLoadError::InvalidCondition { .. })
        ));
        assert!(matches!(
            RuleRegistry::from_json_str(
                r#"{ "trip.delete": { "denied_if": [ { "condition": { "status": "x" }, "message": "x", "code": "NOPE" } ] } }"#
            ),
            Err(RuleLoadError::Json(_))
        ));
    }
}
