use thiserror::Error;

use crate::EpochSeconds;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("out-of-order arrival: {timestamp} precedes last recorded point {previous}")]
    OutOfOrderArrival {
        timestamp: EpochSeconds,
        previous: EpochSeconds,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("nominal period must be a positive number of seconds, got {0}")]
    InvalidPeriod(f64),
    #[error("tolerance must be within [0, {nominal_period}), got {tolerance}")]
    InvalidTolerance { tolerance: f64, nominal_period: f64 },
}

/// Reported by an [`EventSink`](crate::EventSink) when a timeout alert could not be handed to the bus.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    #[error("publish rejected: {0}")]
    Rejected(String),
    #[error("alert encoding failed: {0}")]
    Encode(String),
}
