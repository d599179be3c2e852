//! Axum Router Configuration
//!
//! Two routes: the `/live` WebSocket endpoint that carries voice sessions,
//! and a trivial `/health` liveness probe.

use crate::{state::AppState, ws::ws_handler};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/live", get(ws_handler))
        .with_state(app_state)
}
