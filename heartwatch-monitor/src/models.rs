use heartwatch_core::TimeoutEvent;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

use crate::display::DisplayClock;

/// A field of the wrong type reads as absent instead of failing the payload.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Slave heartbeat: `{"MAC": "D4:AD:20:B7:EA:E2"}`
#[derive(Debug, Deserialize)]
pub struct HeartbeatIn {
    #[serde(rename = "MAC", default, deserialize_with = "lenient")]
    pub mac: Option<String>,
}

/// Digital output of a slave went from 1 to 0
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoOffIn {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub seq: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub mac: Option<String>,
    #[serde(rename = "DO", default)]
    pub do_status: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub master_state: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_network_stable: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub ping_queue: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "lenient")]
    pub ts: Option<String>,
}

/// Slave could not reach the master for a while
#[derive(Debug, Deserialize)]
pub struct PingStatusIn {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub first_offline_ts: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recovered_ts: Option<String>,
}

/// Payload published on the SMS-trigger topic. Field names, order and
/// spacing are consumed as-is by the gateway SMS script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub mac: String,
    pub gap: f64,
    pub last_time: String,
    pub now: String,
}

impl TimeoutAlert {
    pub const KIND: &'static str = "SERIOUS_TIMEOUT";

    pub fn new(event: &TimeoutEvent, clock: &DisplayClock) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            mac: event.device_id.clone(),
            gap: (event.gap_seconds * 10.0).round_ties_even() / 10.0,
            last_time: clock.format_epoch(event.last_seen),
            now: clock.format_epoch(event.now),
        }
    }

    /// Wire bytes, spaced like the gateway scripts' `json.dumps`.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(128);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, GatewayFormatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

/// `", "` between members, `": "` after keys, non-ASCII as `\uXXXX`.
struct GatewayFormatter;

impl Formatter for GatewayFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
