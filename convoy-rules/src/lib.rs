//! Declarative validation for trip and booking mutations.
//!
//! A [`RuleRegistry`] maps each `(entity, action)` pair to a [`Rule`]; the
//! [`ValidationGateway`] evaluates a rule against a [`Context`] built fresh by
//! the [`ContextBuilder`] and returns a [`Decision`].

pub mod error_code;
pub mod context;
pub mod condition;
pub mod registry;
pub mod gateway;

pub use error_code::ErrorCode;
pub use context::{Context, ContextBuilder, ContextField, ContextPolicy, FieldValue};
pub use condition::{Clause, Comparison, Condition, ConditionEvaluator, EvalError, Operator, SpecialToken};
pub use registry::{Action, DenyCondition, Entity, PostAction, Rule, RuleKey, RuleLoadError, RuleRegistry};
pub use gateway::{Decision, Rejection, ValidationGateway};
