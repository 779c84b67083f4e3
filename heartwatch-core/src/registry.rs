//! Per-device heartbeat state shared between the message path and the watchdog.
//!
//! The map lock only guards lookups and inserts. `last_seen` and the history
//! of a device are read and written under that device's own mutex, so two
//! devices never wait on each other beyond the map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::IntervalWindow;
use crate::error::HistoryError;
use crate::history::HeartbeatHistory;
use crate::verdict::{evaluate, RestartVerdict};
use crate::EpochSeconds;

#[derive(Debug)]
struct DeviceEntry {
    last_seen: EpochSeconds,
    history: HeartbeatHistory,
}

impl DeviceEntry {
    fn new(first_seen: EpochSeconds) -> Self {
        Self {
            last_seen: first_seen,
            history: HeartbeatHistory::new(),
        }
    }
}

/// What one accepted arrival produced, copied out of the critical section.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalOutcome {
    Collect {
        count: usize,
        history: Vec<EpochSeconds>,
    },
    Verdict {
        verdict: RestartVerdict,
        d1: f64,
        d2: f64,
        timestamps: [EpochSeconds; 3],
    },
}

/// Read-only copy of a device entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub last_seen: EpochSeconds,
    pub history: Vec<EpochSeconds>,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<Mutex<DeviceEntry>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, device_id: &str, ts: EpochSeconds) -> Arc<Mutex<DeviceEntry>> {
        if let Some(entry) = self.devices.read().get(device_id) {
            return entry.clone();
        }
        self.devices
            .write()
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DeviceEntry::new(ts))))
            .clone()
    }

    /// Apply one heartbeat to `device_id`, creating the entry on first sight.
    ///
    /// A restart verdict resets the history to its newest point before the
    /// device lock is released.
    pub fn record_arrival(
        &self,
        device_id: &str,
        ts: EpochSeconds,
        window: &IntervalWindow,
    ) -> Result<ArrivalOutcome, HistoryError> {
        let entry = self.entry(device_id, ts);
        let mut entry = entry.lock();

        let arrival = entry.history.record_arrival(ts)?;
        entry.last_seen = ts;

        let verdict = evaluate(&arrival, window);
        let outcome = match arrival.gaps {
            Some((d1, d2)) if verdict != RestartVerdict::InsufficientData => {
                let points = entry.history.points();
                let timestamps = [points[0], points[1], points[2]];
                if verdict.requires_reset() {
                    entry.history.reset_keeping_last();
                }
                ArrivalOutcome::Verdict {
                    verdict,
                    d1,
                    d2,
                    timestamps,
                }
            }
            _ => ArrivalOutcome::Collect {
                count: arrival.count,
                history: entry.history.points(),
            },
        };

        Ok(outcome)
    }

    /// `(device_id, last_seen)` for every device, each read under its own lock.
    pub fn last_seen_snapshot(&self) -> Vec<(String, EpochSeconds)> {
        let entries: Vec<(String, Arc<Mutex<DeviceEntry>>)> = self
            .devices
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();

        entries
            .into_iter()
            .map(|(id, entry)| {
                let last_seen = entry.lock().last_seen;
                (id, last_seen)
            })
            .collect()
    }

    pub fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        let entry = self.devices.read().get(device_id)?.clone();
        let entry = entry.lock();
        Some(DeviceSnapshot {
            device_id: device_id.to_string(),
            last_seen: entry.last_seen,
            history: entry.history.points(),
        })
    }

    /// Every device, sorted by id.
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        let mut ids: Vec<String> = self.devices.read().keys().cloned().collect();
        ids.sort();
        ids.iter().filter_map(|id| self.snapshot(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
