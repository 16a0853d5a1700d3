//! Request policy evaluation
//!
//! Decides, for one request, which color to answer with, whether to delay the
//! answer, and whether to fail it. Forced overrides from the environment win
//! unconditionally; otherwise the per-request parameters for the resolved
//! color apply.

pub mod params;

use crate::color::ColorPicker;
use crate::config::{ConfigError, Overrides};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use params::{find_active, parse_body, ColorParameters, EMPTY_ARRAY_SENTINEL};

/// Upper bound (exclusive) of every percentage draw
const PERCENT_RANGE: usize = 100;

/// Errors that fail a single request
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error(transparent)]
    Override(#[from] ConfigError),
}

/// Outcome of evaluating one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub color: String,
    /// Delay that was applied before deciding success
    pub delay: Option<Duration>,
    pub success: bool,
}

/// Per-request decision procedure
///
/// Holds the immutable override snapshot and the shared color picker; cheap
/// to share behind an `Arc` across request tasks.
pub struct PolicyEvaluator {
    overrides: Overrides,
    picker: ColorPicker,
}

impl PolicyEvaluator {
    pub fn new(overrides: Overrides, picker: ColorPicker) -> Self {
        Self { overrides, picker }
    }

    pub fn picker(&self) -> &ColorPicker {
        &self.picker
    }

    /// Evaluate a request body, sleeping for any injected delay
    ///
    /// The sleep suspends only the calling request.
    pub async fn evaluate(&self, body: &[u8]) -> Result<Verdict, PolicyError> {
        let params = parse_body(body)?;
        let color = self.resolve_color();
        let active = find_active(&params, &color);

        let delay = self.decide_delay(active)?;
        if let Some(delay) = delay {
            info!(color = %color, seconds = delay.as_secs(), "Delaying response");
            tokio::time::sleep(delay).await;
        }

        let success = self.decide_success(active)?;
        Ok(Verdict {
            color,
            delay,
            success,
        })
    }

    /// Forced color if configured, otherwise a fresh palette pick
    pub fn resolve_color(&self) -> String {
        match self.overrides.color() {
            Some(forced) => forced.to_string(),
            None => self.picker.pick().to_string(),
        }
    }

    /// Decide the delay for a request whose active record is `active`
    ///
    /// Forced latency always applies. A per-request delay applies when its
    /// probability is positive and a draw in `[0, 100)` does not exceed it.
    pub fn decide_delay(
        &self,
        active: Option<&ColorParameters>,
    ) -> Result<Option<Duration>, PolicyError> {
        if let Some(forced) = self.overrides.latency()? {
            return Ok(Some(forced));
        }

        let Some(params) = active else {
            return Ok(None);
        };
        match params.delay_percent {
            Some(percent) if percent > 0 && self.roll() <= percent => Ok(Some(Duration::from_secs(
                params.delay_length.max(0) as u64,
            ))),
            _ => Ok(None),
        }
    }

    /// Decide whether the request succeeds
    ///
    /// A forced error rate succeeds iff a draw in `[0, 100)` is at least the
    /// rate. A per-request failure applies when its probability is positive
    /// and a draw does not exceed it.
    pub fn decide_success(&self, active: Option<&ColorParameters>) -> Result<bool, PolicyError> {
        if let Some(rate) = self.overrides.error_rate()? {
            return Ok(self.roll() >= rate);
        }

        let Some(params) = active else {
            return Ok(true);
        };
        match params.return500 {
            Some(percent) if percent > 0 => Ok(self.roll() > percent),
            _ => Ok(true),
        }
    }

    fn roll(&self) -> i64 {
        self.picker.random().below(PERCENT_RANGE) as i64
    }
}

#[cfg(test)]
#[path = "evaluator_test.rs"]
mod tests;
