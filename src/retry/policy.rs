//! Backoff computation for retried upload attempts.
//!
//! A `RetryPolicy` is a pure configuration value; `compute_delay` takes the
//! randomness source as an argument so randomized strategies and jitter are
//! reproducible under a seeded RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows across attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Always `base_delay`
    Fixed,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * backoff_factor^(attempt - 1)`
    Exponential,
    /// Uniform over `[base_delay, max_delay]`
    Random,
}

impl RetryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryStrategy::Fixed => "fixed",
            RetryStrategy::Linear => "linear",
            RetryStrategy::Exponential => "exponential",
            RetryStrategy::Random => "random",
        }
    }
}

/// Immutable retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retry budget per task
    pub max_attempts: u32,
    /// Starting delay
    pub base_delay: Duration,
    /// Upper clamp for every strategy
    pub max_delay: Duration,
    /// Growth strategy
    pub strategy: RetryStrategy,
    /// Multiplier for the exponential strategy
    pub backoff_factor: f64,
    /// Add uniform noise of +/-10% of the computed delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(300),
            strategy: RetryStrategy::Exponential,
            backoff_factor: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the delay before the given attempt.
    ///
    /// `attempt` is 1-based: the delay inserted after attempt N failed is
    /// `compute_delay(N, ..)`.
    pub fn compute_delay<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let attempt = attempt.max(1);
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();

        let raw = match self.strategy {
            RetryStrategy::Fixed => base,
            RetryStrategy::Linear => base * attempt as f64,
            RetryStrategy::Exponential => base * self.backoff_factor.powi(attempt as i32 - 1),
            RetryStrategy::Random => {
                if base < max {
                    rng.random_range(base..=max)
                } else {
                    base
                }
            }
        };

        let mut delay = raw.min(max);

        if self.jitter {
            let jitter_range = delay * 0.1;
            if jitter_range > 0.0 {
                delay += rng.random_range(-jitter_range..=jitter_range);
            }
            delay = delay.max(0.0);
        }

        Duration::from_secs_f64(delay)
    }

    /// Compute the delay with the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.compute_delay(attempt, &mut rand::rng())
    }
}
