use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/cache/warm", post(warm_cache))
}

async fn warm_cache(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let listed = state.service.warm_cache().await?;
    info!("Cache warmed on request, {} trips listed", listed);
    Ok(Json(json!({ "listed": listed })))
}
