// Health routes

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

/// GET /health - Liveness probe
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "hakot-backend" }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
