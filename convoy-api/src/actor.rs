use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Caller identity from the `x-actor-id` header. Names the operator of a new
/// trip and the rider of a new booking; elsewhere it is passed through to the
/// rule context as `actor`.
#[derive(Debug, Clone)]
pub struct Actor(pub Option<String>);

impl Actor {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn required(&self) -> Result<&str, AppError> {
        self.as_deref()
            .ok_or_else(|| AppError::ValidationError(format!("missing {} header", ACTOR_HEADER)))
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(Actor(actor))
    }
}
