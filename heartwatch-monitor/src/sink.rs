/*!
 * MONITOR SINK - EventSink writing logs, the event log and MQTT alerts
 *
 * ROLE:
 * Formats engine events the way the field reports expect them (topic in
 * brackets, `< Problem: ... >`, display-offset timestamps), appends them to
 * the JSON Lines event log, and publishes SERIOUS_TIMEOUT alerts on the
 * SMS-trigger topic.
 *
 * Publishing uses the non-blocking `try_publish` of the MQTT client so a
 * sweep never waits on the network.
 */

use heartwatch_core::{EpochSeconds, EventSink, HeartbeatEvent, PublishError, RestartVerdict, TimeoutEvent};
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::display::DisplayClock;
use crate::event_log::EventLog;
use crate::health::HealthTracker;
use crate::models::TimeoutAlert;
use crate::notify::{RestartNotice, RestartNotifier};

/// Outbound side of the bus, reduced to what alerting needs.
pub trait AlertPublisher: Send + Sync {
    fn publish_alert(&self, topic: &str, payload: Vec<u8>) -> Result<(), String>;
}

impl AlertPublisher for AsyncClient {
    fn publish_alert(&self, topic: &str, payload: Vec<u8>) -> Result<(), String> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| e.to_string())
    }
}

pub struct MonitorSink<P> {
    publisher: P,
    heartbeat_topic: String,
    alert_topic: String,
    clock: DisplayClock,
    event_log: Option<Arc<EventLog>>,
    health: HealthTracker,
    notifier: Option<Arc<dyn RestartNotifier>>,
}

impl<P: AlertPublisher> MonitorSink<P> {
    pub fn new(
        publisher: P,
        heartbeat_topic: String,
        alert_topic: String,
        clock: DisplayClock,
        event_log: Option<Arc<EventLog>>,
        health: HealthTracker,
    ) -> Self {
        Self {
            publisher,
            heartbeat_topic,
            alert_topic,
            clock,
            event_log,
            health,
            notifier: None,
        }
    }

    /// Mail every confirmed restart through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn RestartNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn record(&self, event: HeartbeatEvent) {
        if let Some(log) = &self.event_log {
            log.record(&event);
        }
    }
}

impl<P: AlertPublisher> EventSink for MonitorSink<P> {
    fn emit_collect(&self, device_id: &str, count: usize, history: &[EpochSeconds]) {
        info!(
            "[SLAVE_HEARTBEAT_COLLECT] mac={device_id} count={count}, history={}",
            self.clock.format_all(history)
        );
        self.record(HeartbeatEvent::Collect {
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
        let stamps = self.clock.format_all(timestamps);
        if verdict.requires_reset() {
            warn!(
                "[{}] < Problem: {} > mac={device_id} d1={d1:.1}s d2={d2:.1}s timestamps={stamps}",
                self.heartbeat_topic,
                verdict.problem()
            );
        } else {
            info!("[SLAVE_HEARTBEAT_OK] mac={device_id} d1={d1:.1}s d2={d2:.1}s timestamps={stamps}");
        }
        if verdict == RestartVerdict::RestartConfirmed {
            if let Some(notifier) = &self.notifier {
                notifier.notify_restart(RestartNotice {
                    topic: self.heartbeat_topic.clone(),
                    mac: device_id.to_string(),
                    d1,
                    d2,
                    timestamps: (*timestamps).map(|ts| self.clock.format_epoch(ts)),
                });
            }
        }
        self.record(HeartbeatEvent::Verdict {
            mac: device_id.to_string(),
            verdict,
            d1,
            d2,
            timestamps: *timestamps,
        });
    }

    fn emit_out_of_order(&self, device_id: &str, timestamp: EpochSeconds, previous: EpochSeconds) {
        warn!(
            "[{}] out-of-order heartbeat ignored mac={device_id} ts={} previous={}",
            self.heartbeat_topic,
            self.clock.format_epoch(timestamp),
            self.clock.format_epoch(previous)
        );
        self.record(HeartbeatEvent::OutOfOrder {
            mac: device_id.to_string(),
            timestamp,
            previous,
        });
    }

    fn emit_timeout(&self, event: &TimeoutEvent) {
        warn!(
            "[{}] < Problem: SERIOUS TIMEOUT, Restart OR Packet Loss > mac={}, gap={:.1}s timestamps={}, {}",
            self.heartbeat_topic,
            event.device_id,
            event.gap_seconds,
            self.clock.format_epoch(event.last_seen),
            self.clock.format_epoch(event.now)
        );
        self.record(event.into());
    }

    fn publish_timeout(&self, event: &TimeoutEvent) -> Result<(), PublishError> {
        let alert = TimeoutAlert::new(event, &self.clock);
        let payload = alert.to_wire().map_err(|e| PublishError::Encode(e.to_string()))?;
        self.publisher
            .publish_alert(&self.alert_topic, payload)
            .map_err(PublishError::Rejected)?;
        self.health.record_alert_published();
        Ok(())
    }

    fn emit_publish_failure(&self, device_id: &str, err: &PublishError) {
        error!("[WATCHDOG] publish failed mac={device_id}: {err}");
        self.health.record_publish_failure();
        self.record(HeartbeatEvent::PublishFailure {
            mac: device_id.to_string(),
            reason: err.to_string(),
        });
    }
}
