use serde::{Deserialize, Serialize};

use crate::classifier::IntervalState;
use crate::config::IntervalWindow;
use crate::history::Arrival;

/// Outcome of looking at the two most recent gaps of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestartVerdict {
    RestartConfirmed,
    RestartOrPacketLoss,
    Ok,
    InsufficientData,
}

impl RestartVerdict {
    /// Non-OK verdicts collapse the device history to its newest point.
    pub fn requires_reset(self) -> bool {
        matches!(
            self,
            RestartVerdict::RestartConfirmed | RestartVerdict::RestartOrPacketLoss
        )
    }

    pub fn problem(self) -> &'static str {
        match self {
            RestartVerdict::RestartConfirmed => "Device Restart Confirmed",
            RestartVerdict::RestartOrPacketLoss => "Restart OR Packet Loss",
            RestartVerdict::Ok => "Heartbeat OK",
            RestartVerdict::InsufficientData => "Collecting",
        }
    }
}

/// Evaluate an arrival against the decision table.
pub fn evaluate(arrival: &Arrival, window: &IntervalWindow) -> RestartVerdict {
    match arrival.gaps {
        Some((d1, d2)) if arrival.count >= 3 => decide(window.classify(d1), window.classify(d2)),
        _ => RestartVerdict::InsufficientData,
    }
}

/// First match wins. A short gap next to a normal one is a reboot whichever
/// side it lands on; a long gap anywhere else is ambiguous.
pub fn decide(s1: IntervalState, s2: IntervalState) -> RestartVerdict {
    use crate::classifier::IntervalState::{Normal, TooLong, TooShort};

    match (s1, s2) {
        (TooShort, TooShort) | (Normal, TooShort) | (TooShort, Normal) => {
            RestartVerdict::RestartConfirmed
        }
        (TooLong, _) | (_, TooLong) => RestartVerdict::RestartOrPacketLoss,
        (Normal, Normal) => RestartVerdict::Ok,
    }
}
