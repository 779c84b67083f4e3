use std::sync::Arc;

use crate::config::IntervalWindow;
use crate::error::HistoryError;
use crate::events::EventSink;
use crate::registry::{ArrivalOutcome, DeviceRegistry};
use crate::EpochSeconds;

/// Message-path entry point: one call per decoded heartbeat.
#[derive(Clone)]
pub struct HeartbeatTracker {
    registry: Arc<DeviceRegistry>,
    window: IntervalWindow,
    sink: Arc<dyn EventSink>,
}

impl HeartbeatTracker {
    pub fn new(registry: Arc<DeviceRegistry>, window: IntervalWindow, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            window,
            sink,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn window(&self) -> &IntervalWindow {
        &self.window
    }

    /// Record the arrival, then report it. The registry guard is already
    /// released when the sink is called.
    pub fn on_heartbeat(
        &self,
        device_id: &str,
        ts: EpochSeconds,
    ) -> Result<ArrivalOutcome, HistoryError> {
        let outcome = self.registry.record_arrival(device_id, ts, &self.window);

        match &outcome {
            Ok(ArrivalOutcome::Collect { count, history }) => {
                self.sink.emit_collect(device_id, *count, history);
            }
            Ok(ArrivalOutcome::Verdict {
                verdict,
                d1,
                d2,
                timestamps,
            }) => {
                self.sink.emit_verdict(device_id, *verdict, *d1, *d2, timestamps);
            }
            Err(HistoryError::OutOfOrderArrival { timestamp, previous }) => {
                self.sink.emit_out_of_order(device_id, *timestamp, *previous);
            }
        }

        outcome
    }
}
