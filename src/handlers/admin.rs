// handlers/admin.rs - POST /admin-login handler

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// Where the dashboard goes after a successful login
pub const ADMIN_REDIRECT: &str = "/getAllResetReq";

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for AdminLoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminLoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// POST /admin-login - Check dashboard credentials against the admin table
///
/// Success: `200 {"message": "Admin login successful", "redirect": "/getAllResetReq"}`
/// with a `Location` header pointing at the same path.
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(login) = payload.map_err(|e| {
        tracing::warn!("Rejected admin login body: {}", e);
        ApiError::invalid_json("Invalid admin login request")
    })?;

    if login.username.trim().is_empty() || login.password.is_empty() {
        return Err(ApiError::validation_error("Username and password are required"));
    }

    match state
        .audit_store
        .check_admin_credentials(&login.username, &login.password)
        .await
    {
        Ok(true) => {
            tracing::info!(admin = %login.username, "Admin login successful");
            Ok((
                StatusCode::OK,
                [(header::LOCATION, ADMIN_REDIRECT)],
                Json(json!({
                    "message": "Admin login successful",
                    "redirect": ADMIN_REDIRECT
                })),
            )
                .into_response())
        }
        Ok(false) => {
            tracing::warn!(admin = %login.username, "Admin login rejected");
            Err(ApiError::unauthorized("Invalid admin credentials"))
        }
        Err(e) => {
            tracing::error!("Failed to validate admin credentials: {}", e);
            Err(ApiError::internal_server_error("Failed to validate admin credentials"))
        }
    }
}
