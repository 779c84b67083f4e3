/*!
# Heartwatch DevKit - stubs and helpers for tests

- Mock MQTT client to exercise the monitor without a broker
- Payload builders for the monitored topics
- Recording event sink for engine assertions
- Test harness wiring a registry, a tracker and a watchdog together
*/

pub mod mqtt_stub;
pub mod recording_sink;
pub mod test_utils;

pub use mqtt_stub::{MockMqttClient, MonitorMessageBuilder};
pub use recording_sink::RecordingSink;
pub use test_utils::TestHarness;
