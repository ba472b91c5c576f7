use std::time::Duration;

use hydra_model::AttemptNumber;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Delay inserted between a failed attempt and the next one.
pub trait Backoff: Send + Sync + 'static {
    /// Delay after attempt `failed` (1-based) failed.
    fn delay(&self, failed: AttemptNumber) -> Duration;
}

/// Retry immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _failed: AttemptNumber) -> Duration {
        Duration::ZERO
    }
}

/// Same delay after every failure.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn delay(&self, _failed: AttemptNumber) -> Duration {
        self.0
    }
}

/// Randomization applied on top of the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay / 2` plus uniform in `[0, delay / 2]`.
    Equal,
}

/// `first * factor^(failed - 1)`, capped at `max`, then jittered.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub first: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: Jitter,
}

impl ExponentialBackoff {
    pub fn new(first: Duration, max: Duration, factor: f64) -> Self {
        Self {
            first,
            max,
            factor,
            jitter: Jitter::None,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    fn base(&self, failed: AttemptNumber) -> Duration {
        let exp = failed.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.first.as_millis() as f64 * self.factor.powi(exp);
        let cap = self.max.as_millis() as f64;
        if !ms.is_finite() || ms >= cap {
            return self.max;
        }
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, failed: AttemptNumber) -> Duration {
        let base = self.base(failed);
        let ms = base.as_millis() as u64;
        if ms == 0 {
            return base;
        }
        match self.jitter {
            Jitter::None => base,
            Jitter::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            Jitter::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
            }
        }
    }
}
