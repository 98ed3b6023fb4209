//! Harness configuration

use std::time::Duration;

use nix::sys::signal::Signal;

use crate::common::DEFAULT_SIGNAL;

/// Tunables for one sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Largest step count tried before giving up on finding a terminal step
    pub max_steps: usize,
    /// Extra step counts tried after the first terminal one
    pub overshoot: usize,
    /// How long one single-step may take before the child counts as blocked
    pub step_timeout: Duration,
    /// How long a released child may take to exit before it counts as hung
    pub exit_timeout: Duration,
    /// How long an interrupted child waits for the nudge byte
    pub nudge_timeout: Duration,
    /// Signal delivered at the chosen instruction boundary
    pub signal: Signal,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            overshoot: 3,
            step_timeout: Duration::from_millis(50),
            exit_timeout: Duration::from_secs(5),
            nudge_timeout: Duration::from_millis(500),
            signal: DEFAULT_SIGNAL,
        }
    }
}

impl HarnessConfig {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_overshoot(mut self, overshoot: usize) -> Self {
        self.overshoot = overshoot;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = HarnessConfig::default()
            .with_max_steps(20)
            .with_overshoot(1)
            .with_step_timeout(Duration::from_millis(5))
            .with_signal(Signal::SIGUSR2);
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.overshoot, 1);
        assert_eq!(config.step_timeout, Duration::from_millis(5));
        assert_eq!(config.signal, Signal::SIGUSR2);
        assert_eq!(config.exit_timeout, HarnessConfig::default().exit_timeout);
    }
}
