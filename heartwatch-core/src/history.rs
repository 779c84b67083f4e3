use std::collections::VecDeque;

use crate::error::HistoryError;
use crate::EpochSeconds;

/// Number of arrivals needed to derive two gaps.
pub const WINDOW_POINTS: usize = 3;

/// Result of appending one arrival to a [`HeartbeatHistory`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    /// Points held after the append (1, 2 or 3).
    pub count: usize,
    /// `(d1, d2)`, present only once the window is full.
    pub gaps: Option<(f64, f64)>,
}

/// The last three heartbeat arrivals of one device, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartbeatHistory {
    points: VecDeque<EpochSeconds>,
}

impl HeartbeatHistory {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(WINDOW_POINTS + 1),
        }
    }

    /// Append `ts`, dropping the oldest point once more than three are held.
    ///
    /// A timestamp earlier than the newest recorded point is rejected and the
    /// window is left untouched.
    pub fn record_arrival(&mut self, ts: EpochSeconds) -> Result<Arrival, HistoryError> {
        if let Some(&previous) = self.points.back() {
            if ts < previous {
                return Err(HistoryError::OutOfOrderArrival {
                    timestamp: ts,
                    previous,
                });
            }
        }

        self.points.push_back(ts);
        while self.points.len() > WINDOW_POINTS {
            self.points.pop_front();
        }

        Ok(Arrival {
            count: self.points.len(),
            gaps: self.gaps(),
        })
    }

    /// Collapse to the newest point. Called after a restart verdict so the
    /// anomalous gap is not counted a second time.
    pub fn reset_keeping_last(&mut self) {
        while self.points.len() > 1 {
            self.points.pop_front();
        }
    }

    pub fn gaps(&self) -> Option<(f64, f64)> {
        if self.points.len() != WINDOW_POINTS {
            return None;
        }
        let d1 = self.points[1] - self.points[0];
        let d2 = self.points[2] - self.points[1];
        Some((d1, d2))
    }

    pub fn points(&self) -> Vec<EpochSeconds> {
        self.points.iter().copied().collect()
    }

    pub fn last(&self) -> Option<EpochSeconds> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
