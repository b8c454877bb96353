// handlers/password.rs - PUT /update-password handler

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{PasswordResetRequest, ResetStep};

const DECODE_FAILURE_MESSAGE: &str = "Failed to decode request";

/// PUT /update-password - Reset a login's password on its server and every related replica
///
/// Expected Input:
/// ```json
/// {
///   "username": "app_login",
///   "database": "sales",
///   "serverIP": "10.0.0.5",
///   "emailID": "owner@example.com",
///   "oldPassword": "...",
///   "newPassword": "..."
/// }
/// ```
///
/// Success: `200 {"message": "Password updated successfully"}`
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: PasswordResetRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected undecodable password update request: {}", e);
            let (username, server_ip) = identity_hint(&body);
            state
                .reset_service
                .audit()
                .for_request(&username, &server_ip)
                .failed(ResetStep::Received, e.to_string(), DECODE_FAILURE_MESSAGE)
                .await;
            return Err(ApiError::invalid_json(DECODE_FAILURE_MESSAGE));
        }
    };

    let message = state.reset_service.reset_password(&request).await?;
    Ok(Json(json!({ "message": message })))
}

/// Best-effort username and server from a body that did not decode as a request
fn identity_hint(body: &[u8]) -> (String, String) {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let field = |name: &str| value.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
    (field("username"), field("serverIP"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_hint_reads_partial_bodies() {
        let body = br#"{"username": "app_login", "serverIP": "10.0.0.5", "oldPassword": 42}"#;
        assert_eq!(identity_hint(body), ("app_login".to_string(), "10.0.0.5".to_string()));
    }

    #[test]
    fn identity_hint_tolerates_garbage() {
        assert_eq!(identity_hint(b"not json"), (String::new(), String::new()));
        assert_eq!(identity_hint(b"[1, 2]"), (String::new(), String::new()));
    }
}
