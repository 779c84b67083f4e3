/*!
 * STATELESS TOPIC HANDLERS - DO-became-zero and ping-status
 *
 * These two topics need no history: each message is classified on its own,
 * logged at warn level with the topic in brackets, and turned into a
 * [`DeviceAlert`] for the event log.
 */

use serde::Serialize;
use tracing::warn;

use crate::display::DisplayClock;
use crate::models::{DoOffIn, PingStatusIn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DoOffProblem {
    NetworkUnstable,
    MasterWasZero,
    Unknown,
}

impl DoOffProblem {
    pub fn label(self) -> &'static str {
        match self {
            DoOffProblem::NetworkUnstable => "Network Unstable",
            DoOffProblem::MasterWasZero => "Master Was 0",
            DoOffProblem::Unknown => "Unknown Reason",
        }
    }
}

/// Default `< Problem: ... >` text of a ping-status warning; the daily report greps for it.
pub const DEFAULT_PING_PROBLEM: &str = "Slave Ping 10.10.9.2 False";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceAlert {
    DoBecameZero {
        mac: Option<String>,
        kind: Option<String>,
        problem: &'static str,
        seq: Option<u64>,
        master_state: Option<i64>,
        is_network_stable: Option<bool>,
        ping_queue: Option<Vec<i64>>,
        time_happened: String,
    },
    PingStatus {
        mac: Option<String>,
        problem: String,
        status: Option<String>,
        first_offline: String,
        recovered: String,
    },
}

/// A lost ping (a 0 in the queue) on an unstable network explains the
/// drop; a clean queue with the master at 0 means the master switched it.
pub fn classify_do_off(msg: &DoOffIn) -> DoOffProblem {
    let zero_in_queue = msg.ping_queue.as_ref().map(|q| q.contains(&0));

    match (msg.is_network_stable, zero_in_queue) {
        (Some(false), Some(true)) => DoOffProblem::NetworkUnstable,
        (Some(true), Some(false)) if msg.master_state == Some(0) => DoOffProblem::MasterWasZero,
        _ => DoOffProblem::Unknown,
    }
}

fn or_none<T: std::fmt::Debug>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => "None".to_string(),
    }
}

pub fn handle_do_off(topic: &str, msg: DoOffIn, clock: &DisplayClock) -> DeviceAlert {
    let problem = classify_do_off(&msg);
    let time_happened = clock.device_ts_or_raw(msg.ts.as_deref());
    let do_status = msg
        .do_status
        .as_ref()
        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
        .unwrap_or_else(|| "None".into());

    warn!(
        "[{topic}] < Problem: {} >, mac={}, timeHappened={time_happened}, seq={}, DO={do_status}, masterState={}, isNetworkStable={}, pingQueue={}",
        problem.label(),
        msg.mac.as_deref().unwrap_or("None"),
        or_none(&msg.seq),
        or_none(&msg.master_state),
        or_none(&msg.is_network_stable),
        or_none(&msg.ping_queue),
    );

    DeviceAlert::DoBecameZero {
        mac: msg.mac,
        kind: msg.kind,
        problem: problem.label(),
        seq: msg.seq,
        master_state: msg.master_state,
        is_network_stable: msg.is_network_stable,
        ping_queue: msg.ping_queue,
        time_happened,
    }
}

pub fn handle_ping_status(topic: &str, msg: PingStatusIn, problem: &str, clock: &DisplayClock) -> DeviceAlert {
    let first_offline = clock.device_ts_or_raw(msg.first_offline_ts.as_deref());
    let recovered = clock.device_ts_or_raw(msg.recovered_ts.as_deref());

    warn!(
        "[{topic}] < Problem: {problem} >, mac={}, first_offline_ts={first_offline}, recovered_ts={recovered}, pingStatus={}",
        msg.mac.as_deref().unwrap_or("None"),
        msg.status.as_deref().unwrap_or("None"),
    );

    DeviceAlert::PingStatus {
        mac: msg.mac,
        problem: problem.to_string(),
        status: msg.status,
        first_offline,
        recovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn do_off(stable: Option<bool>, queue: Option<Vec<i64>>, master: Option<i64>) -> DoOffIn {
        DoOffIn {
            kind: Some("DO_OFF_1to0".into()),
            seq: Some(1),
            mac: Some("D4:AD:20:B7:EA:E2".into()),
            do_status: Some(serde_json::json!("0")),
            master_state: master,
            is_network_stable: stable,
            ping_queue: queue,
            ts: Some("2026-02-04T07:50:56".into()),
        }
    }

    #[test]
    fn unstable_network_with_lost_ping() {
        let msg = do_off(Some(false), Some(vec![1, 1, 0]), Some(1));
        assert_eq!(classify_do_off(&msg), DoOffProblem::NetworkUnstable);
    }

    #[test]
    fn stable_network_master_at_zero() {
        let msg = do_off(Some(true), Some(vec![1; 10]), Some(0));
        assert_eq!(classify_do_off(&msg), DoOffProblem::MasterWasZero);
    }

    #[test]
    fn stable_network_master_on_is_unknown() {
        let msg = do_off(Some(true), Some(vec![1; 10]), Some(1));
        assert_eq!(classify_do_off(&msg), DoOffProblem::Unknown);
    }

    #[test]
    fn missing_fields_are_unknown() {
        assert_eq!(classify_do_off(&do_off(None, Some(vec![0]), Some(0))), DoOffProblem::Unknown);
        assert_eq!(classify_do_off(&do_off(Some(true), None, Some(0))), DoOffProblem::Unknown);
        assert_eq!(classify_do_off(&do_off(Some(false), Some(vec![1]), None)), DoOffProblem::Unknown);
    }

    #[test]
    fn do_off_alert_carries_converted_time() {
        let clock = DisplayClock::new(8, 11).unwrap();
        let alert = handle_do_off("/SKE_SOLAR/SLAVE_BECOME_0", do_off(Some(false), Some(vec![0]), Some(1)), &clock);
        match alert {
            DeviceAlert::DoBecameZero { problem, kind, time_happened, .. } => {
                assert_eq!(problem, "Network Unstable");
                assert_eq!(kind.as_deref(), Some("DO_OFF_1to0"));
                assert_eq!(time_happened, "2026-02-04 10:50:56");
            }
            other => panic!("unexpected alert {other:?}"),
        }
    }

    #[test]
    fn ping_alert_converts_both_times() {
        let clock = DisplayClock::new(8, 11).unwrap();
        let msg = PingStatusIn {
            status: Some("host is not reachable".into()),
            mac: Some("D4:AD:20:B7:EA:E2".into()),
            first_offline_ts: Some("2026-02-03T13:36:44".into()),
            recovered_ts: Some("2026-02-03T13:36:50".into()),
        };
        let alert = handle_ping_status("/SKE_SOLAR/M300_ping", msg, DEFAULT_PING_PROBLEM, &clock);
        assert_eq!(
            alert,
            DeviceAlert::PingStatus {
                mac: Some("D4:AD:20:B7:EA:E2".into()),
                problem: "Slave Ping 10.10.9.2 False".into(),
                status: Some("host is not reachable".into()),
                first_offline: "2026-02-03 16:36:44".into(),
                recovered: "2026-02-03 16:36:50".into(),
            }
        );
    }
}
