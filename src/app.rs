use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::SecurityConfig;
use crate::handlers;
use crate::state::AppState;

/// Build the HTTP router with its global middleware
pub fn app(state: Arc<AppState>, security: &SecurityConfig) -> Router {
    Router::new()
        // Service probes
        .merge(service_routes())
        // Self-service reset
        .merge(reset_routes())
        // Admin dashboard
        .merge(admin_routes())
        .with_state(state)
        // Global middleware
        .layer(cors_layer(security))
        .layer(TraceLayer::new_for_http())
}

fn service_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actuator/info", get(handlers::actuator_info))
        .route("/health", get(handlers::health))
}

fn reset_routes() -> Router<Arc<AppState>> {
    Router::new().route("/update-password", put(handlers::update_password))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin-login", post(handlers::admin_login))
        .route("/getAllResetReq", get(handlers::get_all_reset_requests))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
