use convoy_booking::{BookingError, BookingResult, TripService};
use std::sync::Arc;

use crate::error::AppError;
use crate::metrics::ApiMetrics;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TripService>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(service: Arc<TripService>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            service,
            metrics: Arc::new(ApiMetrics::new()?),
        })
    }

    /// Count the outcome of a mutation and map its error for the response.
    pub fn track<T>(&self, action: &str, result: BookingResult<T>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.metrics.record_mutation(action);
                Ok(value)
            }
            Err(BookingError::Rejected(rejection)) => {
                self.metrics.record_denial(action, rejection.code.as_str());
                Err(AppError::Rejected(rejection))
            }
            Err(e) => Err(e.into()),
        }
    }
}
