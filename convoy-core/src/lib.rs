pub mod trip;
pub mod rider;
pub mod repository;
pub mod cache;
pub mod notify;
pub mod clock;

pub use trip::{Booking, BookingStatus, Trip, TripStatus, MAX_SEATS};
pub use rider::{Rider, RiderBooking};
pub use repository::{Precondition, TripRepository, WriteOutcome};
pub use cache::CacheStore;
pub use notify::Notifier;
pub use clock::{Clock, FixedClock, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of the persistent store. The store is authoritative, so these are
/// fatal to the operation that hit them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store call timed out: {0}")]
    Timeout(String),
    #[error("Stored document is malformed: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Network and timeout failures may succeed on a later attempt; a malformed
    /// document will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);
