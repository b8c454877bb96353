// handlers/health.rs - service info and health probes

use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub const APP_NAME: &str = "DBASelfService Backend";

/// GET /actuator/info
pub async fn actuator_info() -> Json<Value> {
    Json(json!({
        "app_name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "OK"
    }))
}

/// GET /health - 503 when the audit store is unreachable
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.audit_store.health_check().await.map_err(|e| {
        tracing::warn!("Health check failed: {}", e);
        ApiError::service_unavailable("Audit store unavailable")
    })?;

    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "database": "ok"
    })))
}
