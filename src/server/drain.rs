//! Connection draining
//!
//! Once shutdown begins, every HTTP/1 response carries `Connection: close` so
//! clients stop reusing idle connections, and the readiness probe starts
//! failing so load balancers route new traffic elsewhere.

use axum::{
    extract::{Request, State},
    http::{header::CONNECTION, HeaderValue, Version},
    middleware::Next,
    response::Response,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared draining flag
///
/// Set once by the shutdown coordinator; read on every response.
#[derive(Debug, Clone, Default)]
pub struct DrainState {
    draining: Arc<AtomicBool>,
}

impl DrainState {
    /// Create a new drain state (initially serving normally)
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable keep-alives and readiness
    pub fn start_draining(&self) {
        if !self.draining.swap(true, Ordering::SeqCst) {
            info!("Keep-alives disabled, draining connections");
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

/// Middleware that closes HTTP/1 connections after the response while draining
pub async fn close_when_draining(
    State(drain): State<DrainState>,
    request: Request,
    next: Next,
) -> Response {
    let http1 = request.version() < Version::HTTP_2;
    let mut response = next.run(request).await;
    if http1 && drain.is_draining() {
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
    }
    response
}
