use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use convoy_catalog::RiderTrips;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/riders/{rider_id}/trips", get(rider_trips))
}

async fn rider_trips(
    State(state): State<AppState>,
    Path(rider_id): Path<String>,
) -> Result<Json<RiderTrips>, AppError> {
    Ok(Json(state.service.rider_trips(&rider_id).await?))
}
