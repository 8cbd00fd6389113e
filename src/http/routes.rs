//! HTTP routing configuration for all API endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::handlers::*;
use crate::http::state::AppState;

/// Build the Axum router with all API endpoints.
///
/// # Parameters
///
/// - `state` - Application state holding the attribute registry
///
/// # Returns
///
/// Returns configured Axum `Router`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/names", get(names))
        .route("/api/v1/read", get(read))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/write", post(write))
        .route("/api/v1/attributes", get(attributes))
        .with_state(state)
}
