//! Graceful shutdown handling
//!
//! Handles SIGTERM and SIGINT signals for clean shutdown:
//! - First signal: stop reusing connections, report not ready, start the
//!   grace period
//! - Second signal during the grace period: skip the rest of it
//! - Then stop the HTTP server (bounded) and close the shutdown signal so
//!   CPU burn workers and the entrypoint can finish

use crate::server::drain::DrainState;
use crate::server::router::RunningServer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shutdown signal observed by every component that must stop at the end
///
/// Closes exactly once and every clone sees the closure. `is_shutdown` reads a
/// shared atomic flag so spinning threads never take a lock; the cancellation
/// token only wakes async waiters.
#[derive(Clone)]
pub struct ShutdownSignal {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Wait for shutdown signal
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Check if shutdown was signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Controller for triggering shutdown
pub struct ShutdownController {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl ShutdownController {
    /// Trigger shutdown
    ///
    /// Returns false, without touching the signal, if it was already closed.
    pub fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("Shutdown signal already closed");
            return false;
        }
        self.token.cancel();
        info!("Shutdown signal sent");
        true
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Create a new shutdown signal pair
///
/// Returns (controller, signal) where:
/// - controller: Used to trigger shutdown
/// - signal: Cloned and passed to components that need to listen
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let token = CancellationToken::new();
    let closed = Arc::new(AtomicBool::new(false));
    (
        ShutdownController {
            token: token.clone(),
            closed: closed.clone(),
        },
        ShutdownSignal { token, closed },
    )
}

/// Source of termination signals
///
/// Returns the signal name, or `None` once no further signals can arrive.
#[async_trait]
pub trait TerminationSignals: Send {
    async fn next(&mut self) -> Option<&'static str>;
}

/// SIGTERM and SIGINT from the operating system
#[cfg(unix)]
pub struct OsSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Register the signal handlers
    ///
    /// Must be called before serving so no early signal falls through to the
    /// default handler.
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl TerminationSignals for OsSignals {
    async fn next(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.sigterm.recv() => Some("SIGTERM"),
            Some(()) = self.sigint.recv() => Some("SIGINT"),
            else => None,
        }
    }
}

/// Ctrl+C from the console (Windows)
#[cfg(not(unix))]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
#[async_trait]
impl TerminationSignals for OsSignals {
    async fn next(&mut self) -> Option<&'static str> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("CTRL_C"),
            Err(e) => {
                warn!(error = %e, "Failed to wait for Ctrl+C");
                None
            }
        }
    }
}

/// Signals delivered through a channel, for embedding and tests
#[async_trait]
impl TerminationSignals for mpsc::Receiver<&'static str> {
    async fn next(&mut self) -> Option<&'static str> {
        self.recv().await
    }
}

/// Lifecycle phase of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Serving normally
    Running,
    /// Keep-alives disabled, grace period running
    Draining,
    /// Server is being shut down
    Stopping,
    /// Server stopped and shutdown signal closed
    Stopped,
}

impl ShutdownPhase {
    /// Only forward, single-step transitions are legal
    pub fn can_transition_to(self, next: ShutdownPhase) -> bool {
        matches!(
            (self, next),
            (ShutdownPhase::Running, ShutdownPhase::Draining)
                | (ShutdownPhase::Draining, ShutdownPhase::Stopping)
                | (ShutdownPhase::Stopping, ShutdownPhase::Stopped)
        )
    }
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("could not gracefully shut down the server within {0:?}")]
    Timeout(Duration),

    #[error("server failed: {0}")]
    Server(#[from] std::io::Error),

    #[error("server task panicked or was cancelled: {0}")]
    ServerTask(#[from] tokio::task::JoinError),

    #[error("server exited before shutdown was requested")]
    ServerExited,

    #[error("illegal shutdown transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: ShutdownPhase,
        to: ShutdownPhase,
    },
}

/// Timing of the shutdown sequence
#[derive(Debug, Clone, Copy)]
pub struct ShutdownConfig {
    /// Wait between the first signal and server shutdown
    pub grace_period: Duration,
    /// Hard bound on the graceful server shutdown
    pub shutdown_timeout: Duration,
}

/// Drives the service from RUNNING to STOPPED
///
/// Owns the server, the drain state, and the controller side of the shutdown
/// signal. Exactly one exists per process.
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    drain: DrainState,
    controller: ShutdownController,
    phase: watch::Sender<ShutdownPhase>,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig, drain: DrainState, controller: ShutdownController) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            config,
            drain,
            controller,
            phase,
        }
    }

    /// Observe phase transitions
    pub fn phases(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Run the shutdown state machine to completion
    ///
    /// Returns once the server has stopped and the shutdown signal is closed.
    /// Any error is fatal to the process.
    pub async fn run<S>(self, mut signals: S, mut server: RunningServer) -> Result<(), ShutdownError>
    where
        S: TerminationSignals,
    {
        loop {
            match self.phase() {
                ShutdownPhase::Running => {
                    let signal = tokio::select! {
                        Some(signal) = signals.next() => signal,
                        result = server.wait() => {
                            result??;
                            return Err(ShutdownError::ServerExited);
                        }
                    };
                    // Keep-alives go off before the grace timer starts.
                    self.drain.start_draining();
                    info!(
                        signal = signal,
                        grace_secs = self.config.grace_period.as_secs(),
                        "Signal caught, shutting down after grace period"
                    );
                    self.transition(ShutdownPhase::Draining)?;
                }
                ShutdownPhase::Draining => {
                    tokio::select! {
                        Some(signal) = signals.next() => {
                            info!(signal = signal, "Second signal caught, shutting down now");
                        }
                        _ = tokio::time::sleep(self.config.grace_period) => {
                            info!("Grace period elapsed");
                        }
                    }
                    self.transition(ShutdownPhase::Stopping)?;
                }
                ShutdownPhase::Stopping => {
                    server.stop_accepting();
                    match tokio::time::timeout(self.config.shutdown_timeout, server.wait()).await {
                        Ok(result) => result??,
                        Err(_) => return Err(ShutdownError::Timeout(self.config.shutdown_timeout)),
                    }
                    info!("HTTP server stopped");
                    self.controller.shutdown();
                    self.transition(ShutdownPhase::Stopped)?;
                }
                ShutdownPhase::Stopped => return Ok(()),
            }
        }
    }

    fn transition(&self, next: ShutdownPhase) -> Result<(), ShutdownError> {
        let current = self.phase();
        if !current.can_transition_to(next) {
            return Err(ShutdownError::IllegalTransition {
                from: current,
                to: next,
            });
        }
        self.phase.send_replace(next);
        info!(from = ?current, to = ?next, "Shutdown phase changed");
        Ok(())
    }
}
