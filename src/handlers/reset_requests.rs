// handlers/reset_requests.rs - GET /getAllResetReq handler

use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::ResetLogEntry;

/// GET /getAllResetReq - Every audit row, newest first
pub async fn get_all_reset_requests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ResetLogEntry>>, ApiError> {
    let entries = state.audit_store.list_all().await?;
    tracing::debug!("Returning {} reset log entries", entries.len());
    Ok(Json(entries))
}
