use convoy_core::{CoreError, StoreError};
use convoy_rules::Rejection;

use crate::lifecycle::LifecycleError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The validation gateway denied the action.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Invalid request: {0}")]
    Invalid(String),

    /// A conditional write kept losing to concurrent writers.
    #[error("Concurrent update: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        BookingError::Invalid(err.to_string())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
