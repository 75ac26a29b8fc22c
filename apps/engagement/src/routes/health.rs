use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Reports the service version and which backends this instance runs against.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "engagement",
        "storage": state.config.storage_backend.as_str(),
        "remote_skill_service": state.config.skill_service_url.is_some()
    }))
}
