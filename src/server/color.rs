//! The color endpoint
//!
//! Answers with the resolved color as a quoted string, after any injected
//! delay, with 200 on success and 500 on an injected failure. Malformed
//! bodies and malformed environment overrides answer 500 with the error text.

use crate::color::ColorPicker;
use crate::server::router::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

/// Handle a color request
pub async fn handle_color(State(state): State<AppState>, body: Bytes) -> Response {
    match state.evaluator.evaluate(&body).await {
        Ok(verdict) => render_color(&verdict.color, verdict.success, state.evaluator.picker()),
        Err(e) => {
            warn!(
                body = %String::from_utf8_lossy(&body),
                error = %e,
                "Rejecting color request"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Render a color decision
///
/// The body is the color between literal double quotes. An empty color is
/// replaced by a fresh pick for display only.
pub fn render_color(color: &str, success: bool, picker: &ColorPicker) -> Response {
    let shown = if color.is_empty() {
        picker.pick()
    } else {
        color
    };

    let status = if success {
        info!(color = %shown, status = 200, "Successful");
        StatusCode::OK
    } else {
        info!(color = %shown, status = 500, "Returning 500");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("\"{}\"", shown),
    )
        .into_response()
}
