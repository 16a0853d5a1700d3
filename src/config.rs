//! Process configuration
//!
//! Two layers feed the service:
//! - Command-line flags (`Args`) parameterize the listener, the shutdown
//!   coordinator, and the CPU burn pool.
//! - Environment overrides (`Overrides`) force the color, latency, or error
//!   rate of every response. They are captured once at startup and never
//!   re-read.

use clap::Parser;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default grace period between the first termination signal and server shutdown
///
/// Gives ingress controllers time to drop this instance from their endpoint
/// lists before it stops accepting connections.
pub const DEFAULT_TERMINATION_DELAY_SECS: u64 = 10;

/// Hard bound on the graceful server shutdown once draining is over
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Sentinel for `--cpu-burn` meaning one worker per available processing unit
pub const CPU_BURN_ALL: &str = "all";

pub const ENV_COLOR: &str = "COLOR";
pub const ENV_ERROR_RATE: &str = "ERROR_RATE";
pub const ENV_LATENCY: &str = "LATENCY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid --cpu-burn value {value:?}: expected a number or \"all\"")]
    InvalidCpuBurn {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid LATENCY value {value:?}: {source}")]
    InvalidLatency {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid ERROR_RATE value {value:?}: {source}")]
    InvalidErrorRate {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Command-line flags
#[derive(Debug, Clone, Parser)]
#[command(name = "colorcell", version, about = "Diagnostic color service")]
pub struct Args {
    /// Server listen address; `:PORT` listens on all interfaces
    #[arg(long, default_value = ":8080")]
    pub listen_addr: String,

    /// Termination delay in seconds
    #[arg(long, default_value_t = DEFAULT_TERMINATION_DELAY_SECS)]
    pub termination_delay: u64,

    /// Burn the specified number of CPUs (number or 'all')
    #[arg(long, default_value = "")]
    pub cpu_burn: String,

    /// Directory served for every path other than the API endpoints
    #[arg(long, default_value = ".")]
    pub static_dir: PathBuf,

    /// Hard timeout in seconds for the graceful server shutdown
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,
}

impl Args {
    /// Listen address in a form `TcpListener::bind` accepts
    pub fn bind_addr(&self) -> String {
        normalize_listen_addr(&self.listen_addr)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.termination_delay)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

/// Expand the `:PORT` shorthand to the unspecified IPv4 address
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// How many CPU burn workers to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuBurn {
    /// Flag was empty; the pool is not started at all
    Off,
    Workers(usize),
}

impl CpuBurn {
    /// Parse a `--cpu-burn` value
    ///
    /// `available` is the processing unit count used for `all`.
    pub fn parse(value: &str, available: usize) -> Result<Self, ConfigError> {
        match value {
            "" => Ok(CpuBurn::Off),
            CPU_BURN_ALL => Ok(CpuBurn::Workers(available)),
            n => n
                .parse::<usize>()
                .map(CpuBurn::Workers)
                .map_err(|source| ConfigError::InvalidCpuBurn {
                    value: value.to_string(),
                    source,
                }),
        }
    }

    pub fn worker_count(&self) -> usize {
        match self {
            CpuBurn::Off => 0,
            CpuBurn::Workers(n) => *n,
        }
    }
}

/// Process-wide forced overrides, captured once from the environment
///
/// Latency and error rate stay in their raw form and are parsed on every use,
/// so a malformed value fails each affected request instead of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    color: Option<String>,
    latency: Option<String>,
    error_rate: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            color: read(ENV_COLOR),
            latency: read(ENV_LATENCY),
            error_rate: read(ENV_ERROR_RATE),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_latency(mut self, latency: impl Into<String>) -> Self {
        self.latency = Some(latency.into());
        self
    }

    pub fn with_error_rate(mut self, rate: impl Into<String>) -> Self {
        self.error_rate = Some(rate.into());
        self
    }

    /// Forced response color
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Forced delay; negative values are treated as no delay
    pub fn latency(&self) -> Result<Option<Duration>, ConfigError> {
        let Some(raw) = self.latency.as_deref() else {
            return Ok(None);
        };
        let secs = raw
            .parse::<i64>()
            .map_err(|source| ConfigError::InvalidLatency {
                value: raw.to_string(),
                source,
            })?;
        Ok(Some(Duration::from_secs(secs.max(0) as u64)))
    }

    /// Forced failure rate as a percentage
    pub fn error_rate(&self) -> Result<Option<i64>, ConfigError> {
        let Some(raw) = self.error_rate.as_deref() else {
            return Ok(None);
        };
        raw.parse::<i64>()
            .map(Some)
            .map_err(|source| ConfigError::InvalidErrorRate {
                value: raw.to_string(),
                source,
            })
    }

    /// Parse every override once so misconfiguration shows up in the startup log
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();
        if let Err(e) = self.latency() {
            problems.push(e);
        }
        if let Err(e) = self.error_rate() {
            problems.push(e);
        }
        problems
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
