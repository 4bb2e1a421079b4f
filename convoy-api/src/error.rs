use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use convoy_booking::BookingError;
use convoy_rules::Rejection;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// Denied by the validation gateway.
    Rejected(Rejection),
    ValidationError(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Rejected(rejection) => AppError::Rejected(rejection),
            BookingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            BookingError::Lifecycle(e) => AppError::Conflict(e.to_string()),
            BookingError::Conflict(msg) => AppError::Conflict(msg),
            BookingError::Invalid(msg) => AppError::ValidationError(msg),
            BookingError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Rejected(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": rejection.message,
                    "code": rejection.code,
                    "action": rejection.action.to_string(),
                }),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "code": "VALIDATION_ERROR" }),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}
