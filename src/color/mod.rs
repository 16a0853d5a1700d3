//! Color palette and the process-wide random source
//!
//! Production code uses `SystemRandom`, seeded once from the wall clock.
//! Tests use `ScriptedRandom` to control every draw deterministically.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

/// Colors served when no custom palette is configured
pub const DEFAULT_COLORS: [&str; 6] = ["red", "orange", "yellow", "green", "blue", "purple"];

/// Source of uniform random integers
///
/// Shared by the color picker and the policy evaluator so a single seed
/// drives every draw in the process.
pub trait Randomness: Send + Sync {
    /// Uniform integer in `[0, upper)`. `upper` is never zero.
    fn below(&self, upper: usize) -> usize;
}

/// Production random source backed by a seeded `StdRng`
pub struct SystemRandom {
    rng: Mutex<StdRng>,
}

impl SystemRandom {
    /// Seed from the current wall-clock time in nanoseconds
    pub fn seeded_from_clock() -> Self {
        let now = Utc::now();
        let seed = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros());
        Self::from_seed(seed as u64)
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Randomness for SystemRandom {
    fn below(&self, upper: usize) -> usize {
        // A panic while holding the lock cannot leave the RNG half-updated.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(0..upper)
    }
}

/// Scripted random source for tests
///
/// Returns the queued values in order and panics once they run out, so a
/// test that draws more often than expected fails loudly.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub struct ScriptedRandom {
    draws: Mutex<std::collections::VecDeque<usize>>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = usize>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.draws.lock().expect("ScriptedRandom lock poisoned").len()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl Randomness for ScriptedRandom {
    fn below(&self, upper: usize) -> usize {
        let next = self
            .draws
            .lock()
            .expect("ScriptedRandom lock poisoned")
            .pop_front()
            .expect("ScriptedRandom ran out of draws");
        assert!(next < upper, "scripted draw {} out of range 0..{}", next, upper);
        next
    }
}

/// Ordered, non-empty set of color labels
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Arc<[String]>,
}

impl Palette {
    /// Build a palette, returning `None` when no colors are given
    pub fn new<I, S>(colors: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let colors: Arc<[String]> = colors.into_iter().map(Into::into).collect();
        if colors.is_empty() {
            None
        } else {
            Some(Self { colors })
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Never true for a constructed palette
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn contains(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c == color)
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Uniform color selection over a palette
#[derive(Clone)]
pub struct ColorPicker {
    palette: Palette,
    random: Arc<dyn Randomness>,
}

impl ColorPicker {
    pub fn new(palette: Palette, random: Arc<dyn Randomness>) -> Self {
        Self { palette, random }
    }

    /// Pick one palette entry, independently of every previous pick
    pub fn pick(&self) -> &str {
        let index = self.random.below(self.palette.len());
        &self.palette.colors()[index]
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The random source behind this picker, shared with the policy evaluator
    pub fn random(&self) -> &Arc<dyn Randomness> {
        &self.random
    }
}
