//! Synthetic CPU load
//!
//! Each worker spins on a no-op and polls the shutdown signal on every
//! iteration, so it stops within one loop iteration of the signal closing.
//! Workers run on dedicated OS threads to keep the async runtime responsive.

use crate::config::CpuBurn;
use crate::server::ShutdownSignal;
use std::thread::{self, JoinHandle};
use tracing::info;

/// Running set of CPU burn workers
pub struct BurnPool {
    workers: Vec<JoinHandle<()>>,
}

impl BurnPool {
    /// Start the configured number of workers
    ///
    /// `CpuBurn::Off` starts nothing and logs nothing.
    pub fn start(signal: &ShutdownSignal, burn: CpuBurn) -> std::io::Result<Self> {
        let count = match burn {
            CpuBurn::Off => return Ok(Self { workers: Vec::new() }),
            CpuBurn::Workers(n) => n,
        };

        info!(workers = count, "Burning CPUs");
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let signal = signal.clone();
            let handle = thread::Builder::new()
                .name(format!("cpu-burn-{}", index))
                .spawn(move || spin(index, signal))?;
            workers.push(handle);
        }
        Ok(Self { workers })
    }

    /// Number of workers started
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of workers still spinning
    pub fn running(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_finished()).count()
    }

    /// Block until every worker has exited; returns how many were joined
    ///
    /// Only returns promptly once the shutdown signal has closed.
    pub fn join(self) -> usize {
        let mut joined = 0;
        for worker in self.workers {
            if worker.join().is_ok() {
                joined += 1;
            }
        }
        joined
    }
}

fn spin(index: usize, signal: ShutdownSignal) {
    info!(worker = index, "Burning CPU");
    while !signal.is_shutdown() {
        std::hint::black_box(());
    }
    info!(worker = index, "Stopped CPU burn");
}
