use crate::context::{Context, ContextField, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Operator {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "greater_than" => Some(Operator::GreaterThan),
            "less_than" => Some(Operator::LessThan),
            "greater_than_or_equal" => Some(Operator::GreaterThanOrEqual),
            "less_than_or_equal" => Some(Operator::LessThanOrEqual),
            _ => None,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::GreaterThan => lhs > rhs,
            Operator::LessThan => lhs < rhs,
            Operator::GreaterThanOrEqual => lhs >= rhs,
            Operator::LessThanOrEqual => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub op: Operator,
    pub operand: f64,
}

impl Comparison {
    pub fn new(op: Operator, operand: f64) -> Self {
        Self { op, operand }
    }

    fn holds(&self, value: f64) -> bool {
        self.op.apply(value, self.operand)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialToken {
    InFuture,
    InPast,
}

/// What a field must satisfy. The variant is fixed when the rule is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(FieldValue),
    /// Every comparison must hold against the field's numeric value.
    Compare(Vec<Comparison>),
    /// Every comparison must hold against the minutes between now and the
    /// field's timestamp.
    MinutesFromNow(Vec<Comparison>),
    Token(SpecialToken),
}

/// A condition bound to the context field it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: ContextField,
    pub condition: Condition,
}

impl Clause {
    pub fn new(field: ContextField, condition: Condition) -> Self {
        Self { field, condition }
    }

    pub fn equals(field: ContextField, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Condition::Equals(value.into()))
    }

    pub fn compare(field: ContextField, op: Operator, operand: f64) -> Self {
        Self::new(field, Condition::Compare(vec![Comparison::new(op, operand)]))
    }

    pub fn minutes_from_now(field: ContextField, op: Operator, minutes: f64) -> Self {
        Self::new(field, Condition::MinutesFromNow(vec![Comparison::new(op, minutes)]))
    }

    pub fn token(field: ContextField, token: SpecialToken) -> Self {
        Self::new(field, Condition::Token(token))
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EvalError {
    #[error("field `{field}` holds {found:?}, which cannot be compared numerically")]
    NotNumeric { field: String, found: FieldValue },
    #[error("field `{field}` holds {found:?}, which is not a timestamp")]
    NotTimestamp { field: String, found: FieldValue },
    #[error("comparison on `{field}` has no operators")]
    EmptyComparison { field: String },
}

/// Evaluates clauses against a context. Stateless and free of I/O; "now" is
/// the context's `evaluated_at`.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(clause: &Clause, context: &Context) -> Result<bool, EvalError> {
        let now = context.evaluated_at;

        // A field the context does not carry never satisfies anything.
        let Some(value) = context.get(&clause.field) else {
            return Ok(false);
        };

        match &clause.condition {
            Condition::Equals(expected) => Ok(value.matches(expected)),
            Condition::Token(token) => {
                let at = Self::timestamp(&clause.field, &value)?;
                Ok(match token {
                    SpecialToken::InFuture => at > now,
                    SpecialToken::InPast => at <= now,
                })
            }
            Condition::Compare(comparisons) => {
                Self::ensure_operators(&clause.field, comparisons)?;
                let actual = value.as_f64().ok_or_else(|| EvalError::NotNumeric {
                    field: clause.field.to_string(),
                    found: value.clone(),
                })?;
                Ok(comparisons.iter().all(|c| c.holds(actual)))
            }
            Condition::MinutesFromNow(comparisons) => {
                Self::ensure_operators(&clause.field, comparisons)?;
                let at = Self::timestamp(&clause.field, &value)?;
                let minutes = (at - now).num_milliseconds() as f64 / 60_000.0;
                Ok(comparisons.iter().all(|c| c.holds(minutes)))
            }
        }
    }

    fn timestamp(
        field: &ContextField,
        value: &FieldValue,
    ) -> Result<chrono::DateTime<chrono::Utc>, EvalError> {
        value.as_time().ok_or_else(|| EvalError::NotTimestamp {
            field: field.to_string(),
            found: value.clone(),
        })
    }

    fn ensure_operators(field: &ContextField, comparisons: &[Comparison]) -> Result<(), EvalError> {
        if comparisons.is_empty() {
            return Err(EvalError::EmptyComparison { field: field.to_string() });
        }
        Ok(())
    }
}
