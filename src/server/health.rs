//! Health endpoints for Kubernetes
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Should this instance receive new traffic?

use crate::server::router::AppState;
use axum::{extract::State, http::StatusCode};

/// Liveness probe handler
///
/// Always returns 200 OK - if this responds, the process is alive.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// Returns 200 OK while serving, 503 Service Unavailable once draining so
/// that endpoints controllers stop routing here during the grace period.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    if state.drain.is_draining() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
