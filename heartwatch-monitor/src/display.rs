//! Human-facing timestamps.
//!
//! Gateways stamp their payloads with a naive local time (no offset); the
//! monitor shows every time in one configured display offset.

use heartwatch_core::EpochSeconds;
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("invalid UTC offset: {0}h")]
    Offset(i8),
    #[error("unparseable device timestamp {0:?}")]
    Parse(String),
    #[error(transparent)]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayClock {
    source: UtcOffset,
    display: UtcOffset,
}

fn offset(hours: i8) -> Result<UtcOffset, DisplayError> {
    UtcOffset::from_hms(hours, 0, 0).map_err(|_| DisplayError::Offset(hours))
}

impl DisplayClock {
    pub fn new(source_hours: i8, display_hours: i8) -> Result<Self, DisplayError> {
        Ok(Self {
            source: offset(source_hours)?,
            display: offset(display_hours)?,
        })
    }

    /// `YYYY-MM-DD HH:MM:SS` in the display offset, sub-seconds truncated.
    pub fn format_epoch(&self, ts: EpochSeconds) -> String {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        OffsetDateTime::from_unix_timestamp(ts.floor() as i64)
            .ok()
            .and_then(|dt| dt.to_offset(self.display).format(fmt).ok())
            .unwrap_or_else(|| format!("{ts:.1}"))
    }

    pub fn format_all(&self, points: &[EpochSeconds]) -> String {
        points
            .iter()
            .map(|&ts| self.format_epoch(ts))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Re-express a gateway timestamp (`2026-02-04T07:50:56`) in the display offset.
    pub fn convert_device_ts(&self, raw: &str) -> Result<String, DisplayError> {
        let parse_fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        let display_fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

        let naive = PrimitiveDateTime::parse(raw.trim(), parse_fmt)
            .map_err(|_| DisplayError::Parse(raw.to_string()))?;
        let local = naive.assume_offset(self.source).to_offset(self.display);
        Ok(local.format(display_fmt)?)
    }

    /// Like [`DisplayClock::convert_device_ts`], falling back to the raw text.
    pub fn device_ts_or_raw(&self, raw: Option<&str>) -> String {
        match raw {
            Some(raw) => self.convert_device_ts(raw).unwrap_or_else(|_| raw.to_string()),
            None => "None".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_in_display_offset() {
        let clock = DisplayClock::new(8, 11).unwrap();
        // 2026-02-04T00:00:00Z
        assert_eq!(clock.format_epoch(1_770_163_200.0), "2026-02-04 11:00:00");
        assert_eq!(clock.format_epoch(1_770_163_200.9), "2026-02-04 11:00:00");
    }

    #[test]
    fn gateway_time_moves_from_utc8_to_utc11() {
        let clock = DisplayClock::new(8, 11).unwrap();
        assert_eq!(
            clock.convert_device_ts("2026-02-04T07:50:56").unwrap(),
            "2026-02-04 10:50:56"
        );
        assert_eq!(
            clock.convert_device_ts("2026-02-03T22:30:00").unwrap(),
            "2026-02-04 01:30:00"
        );
    }

    #[test]
    fn bad_device_time_falls_back_to_raw() {
        let clock = DisplayClock::new(8, 11).unwrap();
        assert!(matches!(clock.convert_device_ts("yesterday"), Err(DisplayError::Parse(_))));
        assert_eq!(clock.device_ts_or_raw(Some("yesterday")), "yesterday");
        assert_eq!(clock.device_ts_or_raw(None), "None");
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(matches!(DisplayClock::new(30, 0), Err(DisplayError::Offset(30))));
    }

    #[test]
    fn joins_history() {
        let clock = DisplayClock::new(0, 0).unwrap();
        assert_eq!(clock.format_all(&[0.0, 60.0]), "1970-01-01 00:00:00, 1970-01-01 00:01:00");
    }
}
