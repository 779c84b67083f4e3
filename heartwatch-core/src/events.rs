/*!
 * EVENTS - Boundary between the engine and whoever reports on it
 *
 * ROLE:
 * The engine decides *that* something happened (collecting, verdict,
 * silence) and with which numbers. Formatting, persistence and outbound
 * notification belong to the [`EventSink`] implementation.
 *
 * All sink calls are made after registry guards are released.
 */

use serde::Serialize;

use crate::error::PublishError;
use crate::verdict::RestartVerdict;
use crate::EpochSeconds;

/// A device silent for longer than the timeout threshold, as seen by one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeoutEvent {
    pub device_id: String,
    pub gap_seconds: f64,
    pub last_seen: EpochSeconds,
    pub now: EpochSeconds,
}

pub trait EventSink: Send + Sync {
    /// Window not full yet; `history` holds the points so far.
    fn emit_collect(&self, device_id: &str, count: usize, history: &[EpochSeconds]);

    fn emit_verdict(
        &self,
        device_id: &str,
        verdict: RestartVerdict,
        d1: f64,
        d2: f64,
        timestamps: &[EpochSeconds; 3],
    );

    /// A heartbeat older than the device's newest point was discarded.
    fn emit_out_of_order(&self, device_id: &str, timestamp: EpochSeconds, previous: EpochSeconds);

    fn emit_timeout(&self, event: &TimeoutEvent);

    /// Hand the timeout alert to the outbound channel.
    fn publish_timeout(&self, event: &TimeoutEvent) -> Result<(), PublishError>;

    fn emit_publish_failure(&self, device_id: &str, error: &PublishError);
}

/// Flat record of everything a sink can receive, for event logs and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatEvent {
    Collect {
        mac: String,
        count: usize,
        history: Vec<EpochSeconds>,
    },
    Verdict {
        mac: String,
        verdict: RestartVerdict,
        d1: f64,
        d2: f64,
        timestamps: [EpochSeconds; 3],
    },
    OutOfOrder {
        mac: String,
        timestamp: EpochSeconds,
        previous: EpochSeconds,
    },
    SeriousTimeout {
        mac: String,
        gap: f64,
        last_seen: EpochSeconds,
        now: EpochSeconds,
    },
    PublishFailure {
        mac: String,
        reason: String,
    },
}

impl HeartbeatEvent {
    pub fn mac(&self) -> &str {
        match self {
            HeartbeatEvent::Collect { mac, .. }
            | HeartbeatEvent::Verdict { mac, .. }
            | HeartbeatEvent::OutOfOrder { mac, .. }
            | HeartbeatEvent::SeriousTimeout { mac, .. }
            | HeartbeatEvent::PublishFailure { mac, .. } => mac,
        }
    }
}

impl From<&TimeoutEvent> for HeartbeatEvent {
    fn from(event: &TimeoutEvent) -> Self {
        HeartbeatEvent::SeriousTimeout {
            mac: event.device_id.clone(),
            gap: event.gap_seconds,
            last_seen: event.last_seen,
            now: event.now,
        }
    }
}
