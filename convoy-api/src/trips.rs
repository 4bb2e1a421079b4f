use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use convoy_booking::{NewTrip, TripChanges};
use convoy_catalog::TripListing;
use convoy_core::Trip;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{actor::Actor, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", get(list_trips).post(create_trip))
        .route("/v1/trips/{id}", get(get_trip).patch(update_trip).delete(delete_trip))
        .route("/v1/trips/{id}/publish", post(publish_trip))
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
}

async fn list_trips(State(state): State<AppState>) -> Result<Json<Vec<TripListing>>, AppError> {
    Ok(Json(state.service.listing().await?))
}

async fn create_trip(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let operator = actor.required()?;
    let trip = state.track("trip.create", state.service.create_trip(operator, request).await)?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.service.get_trip(id).await?))
}

async fn update_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(changes): Json<TripChanges>,
) -> Result<Json<Trip>, AppError> {
    let result = state.service.update_trip(id, changes, actor.as_deref()).await;
    Ok(Json(state.track("trip.update", result)?))
}

async fn publish_trip(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Trip>, AppError> {
    let result = state.service.publish_trip(id).await;
    Ok(Json(state.track("trip.publish", result)?))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Trip>, AppError> {
    let result = state.service.cancel_trip(id, actor.as_deref()).await;
    Ok(Json(state.track("trip.cancel", result)?))
}

async fn delete_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    let result = state.service.delete_trip(id, actor.as_deref()).await;
    state.track("trip.delete", result)?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}
