//! Consecutive-failure circuit breaker
//!
//! Trips after `max_consecutive_failures` failed executions with no success in
//! between, counting only failures inside the trailing `failure_window_secs`.
//! Once tripped it stays tripped until an operator resets it.

use crate::config::CircuitBreakerConfig;
use crate::error::{ArbitrageError, ArbitrageResult};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    /// Timestamps of the current failure streak
    failures: VecDeque<u64>,
    tripped: bool,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failures: VecDeque::new(),
            tripped: false,
        }
    }

    pub fn check(&self) -> ArbitrageResult<()> {
        if self.tripped {
            return Err(ArbitrageError::CircuitBreakerTripped {
                failures: self.failures.len() as u32,
            });
        }
        Ok(())
    }

    /// Returns true when this failure trips the breaker
    pub fn record_failure(&mut self, now: u64) -> bool {
        let horizon = now.saturating_sub(self.config.failure_window_secs);
        while self.failures.front().is_some_and(|at| *at < horizon) {
            self.failures.pop_front();
        }
        self.failures.push_back(now);

        if !self.tripped && self.failures.len() as u32 >= self.config.max_consecutive_failures {
            self.tripped = true;
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        if !self.tripped {
            self.failures.clear();
        }
    }

    pub fn reset(&mut self) {
        self.failures.clear();
        self.tripped = false;
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.len() as u32
    }
}
