//! Adaptive request pacing
//!
//! One `RateController` is shared by every worker and both channels, so the
//! delay reflects the total request pressure of the run. The delay:
//! - starts at the configured base
//! - multiplies by the backoff factor on a rate-limit signal or after a run
//!   of consecutive failures, up to the ceiling
//! - steps back down by a fixed amount after a run of consecutive successes,
//!   never below the base

use crate::config::RateConfig;
use std::time::Duration;

/// Pacing counters mutated after every fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RateState {
    pub current_delay_secs: f64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// Computes the delay before each request from recent outcomes
#[derive(Debug)]
pub struct RateController {
    config: RateConfig,
    state: RateState,
}

impl RateController {
    /// Creates a controller sitting at the base delay
    pub fn new(config: RateConfig) -> Self {
        let state = RateState {
            current_delay_secs: config.base_delay_secs,
            consecutive_failures: 0,
            consecutive_successes: 0,
        };
        Self { config, state }
    }

    pub fn state(&self) -> &RateState {
        &self.state
    }

    /// Delay to wait before the next request
    ///
    /// The current delay is spread by the configured jitter fraction and the
    /// result is clamped to `[base, ceiling]`.
    pub fn next_delay(&self) -> Duration {
        let spread = (fastrand::f64() * 2.0 - 1.0) * self.config.jitter;
        let jittered = self.state.current_delay_secs * (1.0 + spread);
        Duration::from_secs_f64(self.clamp(jittered))
    }

    /// Updates the pacing state after a fetch attempt
    ///
    /// # Arguments
    ///
    /// * `success` - The attempt produced a usable page
    /// * `was_rate_limited` - The server signalled throttling; backs off at once
    pub fn record_outcome(&mut self, success: bool, was_rate_limited: bool) {
        if was_rate_limited {
            self.state.consecutive_successes = 0;
            self.state.consecutive_failures += 1;
            self.back_off();
            tracing::debug!(
                "Rate limited, delay now {:.2}s",
                self.state.current_delay_secs
            );
        } else if !success {
            self.state.consecutive_successes = 0;
            self.state.consecutive_failures += 1;
            if self.state.consecutive_failures >= self.config.failure_threshold {
                self.back_off();
                tracing::debug!(
                    "{} consecutive failures, delay now {:.2}s",
                    self.state.consecutive_failures,
                    self.state.current_delay_secs
                );
            }
        } else {
            self.state.consecutive_failures = 0;
            self.state.consecutive_successes += 1;
            if self.state.consecutive_successes >= self.config.success_threshold {
                self.decay();
                self.state.consecutive_successes = 0;
            }
        }
    }

    fn back_off(&mut self) {
        let next = self.state.current_delay_secs * self.config.backoff_factor;
        self.state.current_delay_secs = self.clamp(next);
    }

    fn decay(&mut self) {
        let next = self.state.current_delay_secs - self.config.decay_step_secs;
        self.state.current_delay_secs = self.clamp(next);
    }

    fn clamp(&self, secs: f64) -> f64 {
        secs.max(self.config.base_delay_secs)
            .min(self.config.max_delay_secs)
    }
}
