use std::time::Duration;

use crate::classifier::{classify, IntervalState};
use crate::error::ConfigError;

/// Watchdog polling period, as a multiple of the nominal heartbeat period.
pub const CHECK_INTERVAL_FACTOR: f64 = 1.4;
/// Silence beyond this multiple of the nominal period is a serious timeout.
pub const TIMEOUT_FACTOR: f64 = 1.5;

/// Expected heartbeat cadence. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalWindow {
    nominal_period: f64,
    tolerance: f64,
}

impl IntervalWindow {
    pub fn new(nominal_period: f64, tolerance: f64) -> Result<Self, ConfigError> {
        if !nominal_period.is_finite() || nominal_period <= 0.0 {
            return Err(ConfigError::InvalidPeriod(nominal_period));
        }
        if !tolerance.is_finite() || tolerance < 0.0 || tolerance >= nominal_period {
            return Err(ConfigError::InvalidTolerance {
                tolerance,
                nominal_period,
            });
        }
        Ok(Self {
            nominal_period,
            tolerance,
        })
    }

    pub fn nominal_period(&self) -> f64 {
        self.nominal_period
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn classify(&self, gap_seconds: f64) -> IntervalState {
        classify(gap_seconds, self.nominal_period, self.tolerance)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.nominal_period * CHECK_INTERVAL_FACTOR)
    }

    /// Seconds of silence after which a device is reported as timed out.
    pub fn timeout_threshold(&self) -> f64 {
        self.nominal_period * TIMEOUT_FACTOR
    }
}

impl Default for IntervalWindow {
    /// Hourly heartbeat, five minutes of slack.
    fn default() -> Self {
        Self {
            nominal_period: 3600.0,
            tolerance: 300.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values() {
        let window = IntervalWindow::new(600.0, 120.0).unwrap();
        assert_eq!(window.timeout_threshold(), 900.0);
        assert!((window.check_interval().as_secs_f64() - 840.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_period() {
        assert_eq!(IntervalWindow::new(0.0, 0.0), Err(ConfigError::InvalidPeriod(0.0)));
        assert!(IntervalWindow::new(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn rejects_tolerance_swallowing_period() {
        assert!(matches!(
            IntervalWindow::new(600.0, 600.0),
            Err(ConfigError::InvalidTolerance { .. })
        ));
        assert!(IntervalWindow::new(600.0, -1.0).is_err());
    }
}
