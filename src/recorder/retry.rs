//! Reconnect backoff
//!
//! Bounded exponential backoff with optional equal jitter: each delay is
//! `base / 2 + rand(0..=base / 2)` where `base` doubles per attempt up to
//! `max_delay`.

use std::time::Duration;

use rand::Rng;

/// Policy controlling how the writer retries its chunk source
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Randomize delays to avoid synchronized reconnects
    pub jitter: bool,

    /// Give up after this many consecutive failed sessions (None = never)
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor (at least 1.0)
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Disable jitter
    pub fn no_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Limit consecutive failed sessions
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Start a fresh backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// Stateful delay generator for one retry sequence
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// Delay before the next attempt, or `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let base = self.policy.initial_delay.as_secs_f64()
            * self.policy.multiplier.powi(self.attempt.min(64) as i32);
        let base = base.min(self.policy.max_delay.as_secs_f64());
        self.attempt = self.attempt.saturating_add(1);

        let delay = if self.policy.jitter {
            let half = base / 2.0;
            half + rand::thread_rng().gen_range(0.0..=half)
        } else {
            base
        };

        Some(Duration::from_secs_f64(delay))
    }

    /// Start over after a successful session
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive attempts made since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
