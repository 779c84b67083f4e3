/*!
Test harness for the heartbeat engine

Wires a registry, a tracker and a watchdog around a [`RecordingSink`] so a
test can replay heartbeat timelines and sweeps with explicit timestamps.
*/

use crate::recording_sink::RecordingSink;
use heartwatch_core::{
    ArrivalOutcome, DeviceRegistry, EpochSeconds, HeartbeatEvent, HeartbeatTracker, HistoryError,
    IntervalWindow, TimeoutEvent, WatchdogSweeper,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TestHarness {
    pub sink: Arc<RecordingSink>,
    pub registry: Arc<DeviceRegistry>,
    pub tracker: HeartbeatTracker,
    pub sweeper: WatchdogSweeper,
}

impl TestHarness {
    /// Harness with the given cadence, e.g. `TestHarness::new(600.0, 120.0)`
    pub fn new(nominal_period: f64, tolerance: f64) -> Self {
        env_logger::try_init().ok();

        let window = IntervalWindow::new(nominal_period, tolerance)
            .expect("test harness needs a valid interval window");
        let sink = Arc::new(RecordingSink::new());
        let registry = Arc::new(DeviceRegistry::new());
        let tracker = HeartbeatTracker::new(registry.clone(), window, sink.clone());
        let sweeper = WatchdogSweeper::new(registry.clone(), window, sink.clone());

        Self {
            sink,
            registry,
            tracker,
            sweeper,
        }
    }

    pub fn send_heartbeat(&self, mac: &str, ts: EpochSeconds) -> Result<ArrivalOutcome, HistoryError> {
        let outcome = self.tracker.on_heartbeat(mac, ts);
        log::info!("💓 heartbeat {} @ {} -> {:?}", mac, ts, outcome);
        outcome
    }

    /// Replay a timeline, returning the outcome of the last arrival
    pub fn replay(&self, mac: &str, timeline: &[EpochSeconds]) -> Option<Result<ArrivalOutcome, HistoryError>> {
        timeline.iter().map(|&ts| self.send_heartbeat(mac, ts)).last()
    }

    pub fn sweep_at(&self, now: EpochSeconds) -> Vec<TimeoutEvent> {
        let timeouts = self.sweeper.sweep(now);
        log::info!("🔍 sweep @ {} -> {} timeouts", now, timeouts.len());
        timeouts
    }

    pub fn history_of(&self, mac: &str) -> Vec<EpochSeconds> {
        self.registry
            .snapshot(mac)
            .map(|s| s.history)
            .unwrap_or_default()
    }

    pub fn get_stats(&self) -> TestStats {
        let mut event_counts = HashMap::new();
        for event in self.sink.events() {
            let kind = match event {
                HeartbeatEvent::Collect { .. } => "COLLECT",
                HeartbeatEvent::Verdict { .. } => "VERDICT",
                HeartbeatEvent::OutOfOrder { .. } => "OUT_OF_ORDER",
                HeartbeatEvent::SeriousTimeout { .. } => "SERIOUS_TIMEOUT",
                HeartbeatEvent::PublishFailure { .. } => "PUBLISH_FAILURE",
            };
            *event_counts.entry(kind).or_insert(0) += 1;
        }

        TestStats {
            devices: self.registry.len(),
            event_counts,
            sweeps: self.sweeper.sweeps(),
        }
    }

    pub fn reset(&self) {
        self.sink.clear();
        log::info!("🧹 Test harness reset");
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub devices: usize,
    pub event_counts: HashMap<&'static str, usize>,
    pub sweeps: u64,
}

impl TestStats {
    pub fn count(&self, kind: &str) -> usize {
        self.event_counts.get(kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heartwatch_core::RestartVerdict;

    #[test]
    fn test_restart_timeline() {
        let harness = TestHarness::new(600.0, 120.0);

        let outcome = harness.replay("D4:AD:20:B7:EA:E2", &[0.0, 120.0, 720.0]).unwrap().unwrap();
        assert!(matches!(
            outcome,
            ArrivalOutcome::Verdict { verdict: RestartVerdict::RestartConfirmed, .. }
        ));
        assert_eq!(harness.history_of("D4:AD:20:B7:EA:E2"), vec![720.0]);

        let stats = harness.get_stats();
        assert_eq!(stats.count("COLLECT"), 2);
        assert_eq!(stats.count("VERDICT"), 1);
    }

    #[test]
    fn test_watchdog_threshold() {
        let harness = TestHarness::new(600.0, 120.0);
        harness.send_heartbeat("late", 0.0).unwrap();
        harness.send_heartbeat("fresh", 2.0).unwrap();

        let timeouts = harness.sweep_at(901.0);
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts[0].device_id, "late");
        assert_eq!(harness.sink.published().len(), 1);

        let stats = harness.get_stats();
        assert_eq!(stats.sweeps, 1);
        assert_eq!(stats.devices, 2);
    }

    #[test]
    fn test_reset_keeps_registry() {
        let harness = TestHarness::new(600.0, 120.0);
        harness.send_heartbeat("a", 0.0).unwrap();
        harness.reset();
        assert!(harness.sink.events().is_empty());
        assert_eq!(harness.history_of("a"), vec![0.0]);
    }
}
