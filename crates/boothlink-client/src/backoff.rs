//! Capped exponential reconnect delay.

use std::time::Duration;

/// Floor applied to every delay so a misconfigured client can never spin.
pub const MIN_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_DELAY);
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay before the next attempt; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Start over after a successful registration.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
