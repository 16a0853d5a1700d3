//! Router assembly and the running HTTP server

use crate::policy::PolicyEvaluator;
use crate::server::color::handle_color;
use crate::server::drain::{close_when_draining, DrainState};
use crate::server::health::{healthz, readyz};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<PolicyEvaluator>,
    pub drain: DrainState,
}

impl AppState {
    pub fn new(evaluator: Arc<PolicyEvaluator>, drain: DrainState) -> Self {
        Self { evaluator, drain }
    }
}

/// Build the router
///
/// - `/color` (any method) - colored response with injected faults; bodies of
///   any size are read in full
/// - `/healthz`, `/readyz` - probes
/// - everything else - static files from `static_dir`
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let drain = state.drain.clone();

    Router::new()
        .route(
            "/color",
            any(handle_color).layer(DefaultBodyLimit::disable()),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .with_state(state)
        .layer(middleware::from_fn_with_state(drain, close_when_draining))
}

/// An HTTP server serving in a background task
pub struct RunningServer {
    local_addr: SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and let in-flight requests finish
    pub fn stop_accepting(&self) {
        self.stop.cancel();
    }

    /// Wait for the server task to finish
    ///
    /// Cancel-safe; must not be polled again after it has completed.
    pub async fn wait(&mut self) -> Result<std::io::Result<()>, JoinError> {
        (&mut self.task).await
    }
}

/// Serve `router` on an already bound listener
pub fn spawn_server(listener: TcpListener, router: Router) -> std::io::Result<RunningServer> {
    let local_addr = listener.local_addr()?;
    let stop = CancellationToken::new();
    let graceful = stop.clone().cancelled_owned();

    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(graceful)
            .await
    });
    info!(addr = %local_addr, "Started server");

    Ok(RunningServer {
        local_addr,
        stop,
        task,
    })
}

/// Spawn a server on an ephemeral loopback port for tests
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) async fn spawn_test_server(
    overrides: crate::config::Overrides,
    static_dir: impl AsRef<Path>,
) -> (RunningServer, DrainState) {
    use crate::color::{ColorPicker, Palette, SystemRandom};

    let drain = DrainState::new();
    let picker = ColorPicker::new(Palette::default(), Arc::new(SystemRandom::from_seed(1)));
    let evaluator = Arc::new(PolicyEvaluator::new(overrides, picker));
    let router = build_router(AppState::new(evaluator, drain.clone()), static_dir);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let server = spawn_server(listener, router).expect("spawn server");
    (server, drain)
}
