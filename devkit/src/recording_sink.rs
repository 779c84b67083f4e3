/*!
EventSink that keeps everything in memory.

Publishing succeeds by default; [`RecordingSink::fail_publishes`] makes every
following publish report the given reason, to exercise the failure path.
*/

use heartwatch_core::{EpochSeconds, EventSink, HeartbeatEvent, PublishError, RestartVerdict, TimeoutEvent};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HeartbeatEvent>>,
    published: Mutex<Vec<TimeoutEvent>>,
    publish_failure: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_publishes(&self, reason: &str) {
        *self.publish_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn events(&self) -> Vec<HeartbeatEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events concerning one device, in emission order.
    pub fn events_for(&self, mac: &str) -> Vec<HeartbeatEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.mac() == mac)
            .collect()
    }

    /// Timeouts that were successfully handed to the publish channel.
    pub fn published(&self) -> Vec<TimeoutEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn last_event(&self) -> Option<HeartbeatEvent> {
        self.events.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.published.lock().unwrap().clear();
    }

    fn push(&self, event: HeartbeatEvent) {
        log::debug!("🧾 [SINK] {:?}", event);
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingSink {
    fn emit_collect(&self, device_id: &str, count: usize, history: &[EpochSeconds]) {
        self.push(HeartbeatEvent::Collect {
            mac: device_id.to_string(),
            count,
            history: history.to_vec(),
        });
    }

    fn emit_verdict(
        &self,
        device_id: &str,
        verdict: RestartVerdict,
        d1: f64,
        d2: f64,
        timestamps: &[EpochSeconds; 3],
    ) {
        self.push(HeartbeatEvent::Verdict {
            mac: device_id.to_string(),
            verdict,
            d1,
            d2,
            timestamps: *timestamps,
        });
    }

    fn emit_out_of_order(&self, device_id: &str, timestamp: EpochSeconds, previous: EpochSeconds) {
        self.push(HeartbeatEvent::OutOfOrder {
            mac: device_id.to_string(),
            timestamp,
            previous,
        });
    }

    fn emit_timeout(&self, event: &TimeoutEvent) {
        self.push(event.into());
    }

    fn publish_timeout(&self, event: &TimeoutEvent) -> Result<(), PublishError> {
        if let Some(reason) = self.publish_failure.lock().unwrap().clone() {
            return Err(PublishError::Rejected(reason));
        }
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn emit_publish_failure(&self, device_id: &str, error: &PublishError) {
        self.push(HeartbeatEvent::PublishFailure {
            mac: device_id.to_string(),
            reason: error.to_string(),
        });
    }
}
