/*!
Stand-in for the outbound side of the MQTT client.

Alerts leave the monitor through the synchronous `try_publish` of
`rumqttc::AsyncClient`; [`MockMqttClient::try_publish`] has the same shape
and keeps every accepted message so tests can inspect what went on the bus.
*/

use anyhow::Result;
use rumqttc::QoS;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
struct BusState {
    published: Vec<MockMessage>,
    reject_with: Option<String>,
}

/// Cloning shares the recorded traffic.
#[derive(Clone, Default)]
pub struct MockMqttClient {
    state: Arc<Mutex<BusState>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        // a panicking test thread must not hide the traffic from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reject every following publish with `reason`, like a full request queue.
    pub fn fail_publishes(&self, reason: &str) {
        self.state().reject_with = Some(reason.to_string());
    }

    pub fn try_publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let mut state = self.state();
        if let Some(reason) = &state.reject_with {
            anyhow::bail!(reason.clone());
        }

        let topic = topic.into();
        let payload = payload.into();
        log::info!("📤 [MOCK] {} <- {} bytes (retain={})", topic, payload.len(), retain);
        state.published.push(MockMessage { topic, payload, qos, retain });
        Ok(())
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.state().published.clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.state()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Newest payload on `topic`, decoded from JSON
    pub fn get_last_json_message<T: DeserializeOwned>(&self, topic: &str) -> Result<Option<T>> {
        let last = self
            .state()
            .published
            .iter()
            .rev()
            .find(|m| m.topic == topic)
            .map(|m| m.payload.clone());

        match last {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Forget the traffic and accept publishes again.
    pub fn clear(&self) {
        *self.state() = BusState::default();
    }
}

/// Payloads as the field gateways send them
pub struct MonitorMessageBuilder;

impl MonitorMessageBuilder {
    /// Hourly slave heartbeat
    pub fn heartbeat(mac: &str) -> Value {
        serde_json::json!({ "MAC": mac })
    }

    /// Digital output fell from 1 to 0
    pub fn do_off(
        mac: &str,
        seq: u64,
        master_state: i64,
        is_network_stable: bool,
        ping_queue: &[u8],
        ts: &str,
    ) -> Value {
        serde_json::json!({
            "type": "DO_OFF_1to0",
            "seq": seq,
            "mac": mac,
            "DO": "0",
            "masterState": master_state,
            "isNetworkStable": is_network_stable,
            "pingQueue": ping_queue,
            "ts": ts
        })
    }

    /// Slave lost, then regained, reachability of the master
    pub fn ping_status(mac: &str, first_offline_ts: &str, recovered_ts: &str) -> Value {
        serde_json::json!({
            "status": "host is not reachable",
            "mac": mac,
            "first_offline_ts": first_offline_ts,
            "recovered_ts": recovered_ts
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERTS: &str = "/monitor_send_sms/SERIOUS_TIMEOUT";

    #[test]
    fn records_accepted_publishes_in_order() {
        let client = MockMqttClient::new();
        let observer = client.clone();

        client.try_publish(ALERTS, QoS::AtMostOnce, false, br#"{"gap":1.0}"#.to_vec()).unwrap();
        client.try_publish("/other", QoS::AtLeastOnce, true, b"x".to_vec()).unwrap();
        client.try_publish(ALERTS, QoS::AtMostOnce, false, br#"{"gap":2.0}"#.to_vec()).unwrap();

        assert_eq!(observer.get_published_messages().len(), 3);
        assert_eq!(observer.find_messages_by_topic(ALERTS).len(), 2);
        let last: Value = observer.get_last_json_message(ALERTS).unwrap().unwrap();
        assert_eq!(last["gap"], 2.0);
    }

    #[test]
    fn rejected_publish_is_not_recorded() {
        let client = MockMqttClient::new();
        client.fail_publishes("rc=4");

        let err = client.try_publish(ALERTS, QoS::AtMostOnce, false, b"x".to_vec()).unwrap_err();
        assert_eq!(err.to_string(), "rc=4");
        assert!(client.get_published_messages().is_empty());

        client.clear();
        assert!(client.try_publish(ALERTS, QoS::AtMostOnce, false, b"x".to_vec()).is_ok());
    }

    #[test]
    fn missing_topic_has_no_last_message() {
        let client = MockMqttClient::new();
        let parsed: Option<Value> = client.get_last_json_message(ALERTS).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn builders_follow_gateway_payloads() {
        let hb = MonitorMessageBuilder::heartbeat("D4:AD:20:B7:EA:E2");
        assert_eq!(hb["MAC"], "D4:AD:20:B7:EA:E2");

        let off = MonitorMessageBuilder::do_off("mac", 13, 1, false, &[1, 1, 0], "2026-02-03T13:36:43");
        assert_eq!(off["isNetworkStable"], false);
        assert_eq!(off["pingQueue"][2], 0);

        let ping = MonitorMessageBuilder::ping_status("mac", "2026-02-03T13:36:44", "2026-02-03T13:36:50");
        assert_eq!(ping["recovered_ts"], "2026-02-03T13:36:50");

    }
}
