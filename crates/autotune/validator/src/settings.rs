use crate::error::{ValidatorError, ValidatorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Windows and thresholds of impact validation and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Length of the validation and monitoring windows.
    pub window_ms: u64,
    /// Spacing of metric samples inside a monitoring window.
    pub sample_interval_ms: u64,
    /// Share of each projected improvement that must be realized.
    pub realized_fraction: f64,
    /// Band around the expected value a monitored average may sit in.
    pub monitor_tolerance: f64,
    pub significance_threshold: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            window_ms: 300_000,
            sample_interval_ms: 1_000,
            realized_fraction: 0.7,
            monitor_tolerance: 1.1,
            significance_threshold: 0.95,
        }
    }
}

impl ValidationSettings {
    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = window_ms;
        self
    }

    pub fn with_sample_interval_ms(mut self, sample_interval_ms: u64) -> Self {
        self.sample_interval_ms = sample_interval_ms;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Sample spacing, never longer than the window.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.min(self.window_ms))
    }

    /// Samples taken across one monitoring window, at least one.
    pub fn samples_per_window(&self) -> u64 {
        if self.sample_interval_ms == 0 {
            return 1;
        }
        (self.window_ms / self.sample_interval_ms).max(1)
    }

    pub fn validate(&self) -> ValidatorResult<()> {
        if !(self.realized_fraction.is_finite() && self.realized_fraction >= 0.0) {
            return Err(ValidatorError::InvalidSettings(format!(
                "realized_fraction must be a non-negative number, got {}",
                self.realized_fraction
            )));
        }
        if !(self.monitor_tolerance.is_finite() && self.monitor_tolerance >= 1.0) {
            return Err(ValidatorError::InvalidSettings(format!(
                "monitor_tolerance must be at least 1.0, got {}",
                self.monitor_tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.significance_threshold) {
            return Err(ValidatorError::InvalidSettings(format!(
                "significance_threshold must lie in [0, 1], got {}",
                self.significance_threshold
            )));
        }
        Ok(())
    }
}
