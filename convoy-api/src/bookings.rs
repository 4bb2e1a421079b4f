use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use convoy_core::{Booking, Trip};
use serde::Serialize;
use uuid::Uuid;

use crate::{actor::Actor, error::AppError, state::AppState};

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking: Booking,
    trip: Trip,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/bookings", post(book_seat))
        .route("/v1/trips/{id}/bookings/{booking_id}", delete(cancel_booking))
        .route("/v1/trips/{id}/bookings/{booking_id}/check-in", post(check_in))
        .route("/v1/trips/{id}/bookings/{booking_id}/complete", post(complete_booking))
}

async fn book_seat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let rider = actor.required()?;
    let claim = state.track("booking.create", state.service.book_seat(id, rider).await)?;
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            booking: claim.booking,
            trip: claim.trip,
        }),
    ))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path((id, booking_id)): Path<(Uuid, Uuid)>,
    actor: Actor,
) -> Result<Json<BookingResponse>, AppError> {
    let result = state.service.cancel_booking(id, booking_id, actor.as_deref()).await;
    let release = state.track("booking.cancel", result)?;
    Ok(Json(BookingResponse {
        booking: release.booking,
        trip: release.trip,
    }))
}

async fn check_in(
    State(state): State<AppState>,
    Path((id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Trip>, AppError> {
    let result = state.service.check_in(id, booking_id).await;
    Ok(Json(state.track("booking.check_in", result)?))
}

async fn complete_booking(
    State(state): State<AppState>,
    Path((id, booking_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Trip>, AppError> {
    let result = state.service.complete_booking(id, booking_id).await;
    Ok(Json(state.track("booking.complete", result)?))
}
