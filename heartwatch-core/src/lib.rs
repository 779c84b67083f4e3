//! Heartwatch core - restart detection from heartbeat timing
//!
//! Pure engine, no transport:
//! - [`classifier`]: one gap → TOO_SHORT / NORMAL / TOO_LONG
//! - [`history`]: sliding window of the last 3 arrivals per device
//! - [`verdict`]: two classified gaps → restart verdict
//! - [`registry`]: per-device state shared between handlers and watchdog
//! - [`tracker`]: message-handling entry point, emits to an [`EventSink`]
//! - [`watchdog`]: periodic sweep for devices that went silent

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod registry;
pub mod tracker;
pub mod verdict;
pub mod watchdog;

pub use classifier::{classify, IntervalState};
pub use config::IntervalWindow;
pub use error::{ConfigError, HistoryError, PublishError};
pub use events::{EventSink, HeartbeatEvent, TimeoutEvent};
pub use history::{Arrival, HeartbeatHistory};
pub use registry::{ArrivalOutcome, DeviceRegistry, DeviceSnapshot};
pub use tracker::HeartbeatTracker;
pub use verdict::{evaluate, RestartVerdict};
pub use watchdog::{SweeperState, WatchdogSweeper};

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-second precision.
pub type EpochSeconds = f64;

/// Current wall-clock time as [`EpochSeconds`].
pub fn epoch_now() -> EpochSeconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
