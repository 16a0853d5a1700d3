//! HTTP server for the color, health, and static endpoints
//!
//! Provides:
//! - `/color` - Colored response with injected latency and failures
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (not draining)
//! - everything else - Static files
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

pub mod color;
pub mod drain;
mod health;
pub mod router;
pub mod shutdown;

pub use drain::DrainState;
pub use health::{healthz, readyz};
pub use router::{build_router, spawn_server, AppState, RunningServer};
pub use shutdown::{
    shutdown_channel, OsSignals, ShutdownConfig, ShutdownController, ShutdownCoordinator,
    ShutdownError, ShutdownPhase, ShutdownSignal, TerminationSignals,
};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "color_test.rs"]
mod color_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
