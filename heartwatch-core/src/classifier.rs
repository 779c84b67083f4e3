use serde::{Deserialize, Serialize};

/// Position of a single gap relative to `nominal ± tolerance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalState {
    TooShort,
    Normal,
    TooLong,
}

/// Classify one gap. Both edges of the tolerance window count as `Normal`.
pub fn classify(gap_seconds: f64, nominal_period: f64, tolerance: f64) -> IntervalState {
    if gap_seconds < nominal_period - tolerance {
        IntervalState::TooShort
    } else if gap_seconds > nominal_period + tolerance {
        IntervalState::TooLong
    } else {
        IntervalState::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_edges_are_inclusive() {
        assert_eq!(classify(480.0, 600.0, 120.0), IntervalState::Normal);
        assert_eq!(classify(479.0, 600.0, 120.0), IntervalState::TooShort);
        assert_eq!(classify(720.0, 600.0, 120.0), IntervalState::Normal);
        assert_eq!(classify(721.0, 600.0, 120.0), IntervalState::TooLong);
    }

    #[test]
    fn fractional_gaps_just_outside_the_window() {
        assert_eq!(classify(479.9, 600.0, 120.0), IntervalState::TooShort);
        assert_eq!(classify(720.1, 600.0, 120.0), IntervalState::TooLong);
    }

    #[test]
    fn zero_gap_is_too_short() {
        assert_eq!(classify(0.0, 3600.0, 300.0), IntervalState::TooShort);
    }

    #[test]
    fn zero_tolerance_only_accepts_exact_period() {
        assert_eq!(classify(600.0, 600.0, 0.0), IntervalState::Normal);
        assert_eq!(classify(599.0, 600.0, 0.0), IntervalState::TooShort);
        assert_eq!(classify(601.0, 600.0, 0.0), IntervalState::TooLong);
    }
}
