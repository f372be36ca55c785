//! Reconnect policy: exponential backoff with a fixed attempt budget.
//!
//! Attempt `n` waits `base * 2^(n-1)`. There is no jitter and no cap
//! besides the budget itself.

use std::time::Duration;

use chatbridge_core::BridgeConfig;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.reconnect_base(), config.max_reconnect_attempts)
    }

    /// Count one more attempt and return how long to wait before it, or
    /// `None` when the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.delay_for(self.attempts))
    }

    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor)
    }

    /// Called on every successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
