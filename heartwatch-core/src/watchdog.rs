//! [`WatchdogSweeper`] - finds devices that stopped reporting altogether.
//!
//! Runs on its own interval (`nominal * 1.4`), independent of message
//! arrival. Each sweep snapshots `last_seen` per device under the registry
//! guards, then compares and emits outside them. A device beyond
//! `nominal * 1.5` of silence is reported on every sweep until it resumes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::IntervalWindow;
use crate::events::{EventSink, TimeoutEvent};
use crate::registry::DeviceRegistry;
use crate::{epoch_now, EpochSeconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// Waiting for the next tick.
    Idle,
    Sweeping,
}

type Clock = Arc<dyn Fn() -> EpochSeconds + Send + Sync>;

pub struct WatchdogSweeper {
    registry: Arc<DeviceRegistry>,
    window: IntervalWindow,
    sink: Arc<dyn EventSink>,
    clock: Clock,
    state: Mutex<SweeperState>,
    sweeps: AtomicU64,
}

impl WatchdogSweeper {
    pub fn new(registry: Arc<DeviceRegistry>, window: IntervalWindow, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            window,
            sink,
            clock: Arc::new(epoch_now),
            state: Mutex::new(SweeperState::Idle),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock used by [`WatchdogSweeper::spawn`].
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> EpochSeconds + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> SweeperState {
        *self.state.lock()
    }

    /// Number of completed sweeps.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// One pass over the registry at time `now`. Returns the timeouts found.
    pub fn sweep(&self, now: EpochSeconds) -> Vec<TimeoutEvent> {
        *self.state.lock() = SweeperState::Sweeping;

        let threshold = self.window.timeout_threshold();
        let timeouts: Vec<TimeoutEvent> = self
            .registry
            .last_seen_snapshot()
            .into_iter()
            .filter_map(|(device_id, last_seen)| {
                let gap = now - last_seen;
                (gap > threshold).then_some(TimeoutEvent {
                    device_id,
                    gap_seconds: gap,
                    last_seen,
                    now,
                })
            })
            .collect();

        for event in &timeouts {
            self.sink.emit_timeout(event);
            if let Err(e) = self.sink.publish_timeout(event) {
                self.sink.emit_publish_failure(&event.device_id, &e);
            }
        }

        self.sweeps.fetch_add(1, Ordering::Relaxed);
        *self.state.lock() = SweeperState::Idle;
        debug!(timeouts = timeouts.len(), "[watchdog] sweep done");
        timeouts
    }

    /// Start the periodic sweep. Sending `true` on `shutdown` (or dropping the
    /// sender) stops future ticks; a sweep already running completes first.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.window.check_interval();
        info!(
            "[watchdog] started: check every {:.0}s, timeout after {:.0}s",
            period.as_secs_f64(),
            self.window.timeout_threshold()
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = (self.clock)();
                        self.sweep(now);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("[watchdog] stopped after {} sweeps", self.sweeps());
        })
    }
}
