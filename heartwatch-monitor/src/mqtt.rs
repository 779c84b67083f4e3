use crate::config::{MqttConf, TopicsConf};
use crate::display::DisplayClock;
use crate::event_log::EventLog;
use crate::handlers::{handle_do_off, handle_ping_status, DeviceAlert, DEFAULT_PING_PROBLEM};
use crate::health::HealthTracker;
use crate::models::{DoOffIn, HeartbeatIn, PingStatusIn};
use heartwatch_core::{ArrivalOutcome, EpochSeconds, HeartbeatTracker};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub fn create_mqtt_client(cfg: &MqttConf) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(&cfg.client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    if let Some(user) = &cfg.username {
        opts.set_credentials(user, cfg.password.clone().unwrap_or_default());
    }
    AsyncClient::new(opts, 64)
}

/// Payload as received: parsed JSON when it looks like JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

pub fn parse_payload(bytes: &[u8]) -> Payload {
    let raw = String::from_utf8_lossy(bytes).trim().to_string();
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(v) = serde_json::from_str(&raw) {
            return Payload::Json(v);
        }
    }
    Payload::Text(raw)
}

/// What the dispatcher did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Heartbeat(ArrivalOutcome),
    OutOfOrder,
    Alert(DeviceAlert),
    Retained,
    /// Known topic, payload unusable.
    Dropped,
    Unhandled,
}

/// Routes inbound messages by topic to the heartbeat engine or the
/// stateless handlers.
pub struct Dispatcher {
    topics: TopicsConf,
    tracker: HeartbeatTracker,
    clock: DisplayClock,
    event_log: Option<Arc<EventLog>>,
    ping_problem: String,
}

impl Dispatcher {
    pub fn new(
        topics: TopicsConf,
        tracker: HeartbeatTracker,
        clock: DisplayClock,
        event_log: Option<Arc<EventLog>>,
    ) -> Self {
        Self {
            topics,
            tracker,
            clock,
            event_log,
            ping_problem: DEFAULT_PING_PROBLEM.to_string(),
        }
    }

    pub fn with_ping_problem(mut self, label: impl Into<String>) -> Self {
        self.ping_problem = label.into();
        self
    }

    pub fn handle(&self, topic: &str, bytes: &[u8], retain: bool, received_at: EpochSeconds) -> Routed {
        if retain {
            info!("[monitor] retained message on {topic}, ignored");
            return Routed::Retained;
        }

        let payload = parse_payload(bytes);
        if topic == self.topics.heartbeat {
            self.on_heartbeat(topic, payload, received_at)
        } else if topic == self.topics.do_off {
            match decode::<DoOffIn>(topic, payload) {
                Some(msg) => self.alert(handle_do_off(topic, msg, &self.clock)),
                None => Routed::Dropped,
            }
        } else if topic == self.topics.ping {
            match decode::<PingStatusIn>(topic, payload) {
                Some(msg) => self.alert(handle_ping_status(topic, msg, &self.ping_problem, &self.clock)),
                None => Routed::Dropped,
            }
        } else {
            let raw = match payload {
                Payload::Json(v) => v.to_string(),
                Payload::Text(t) => t,
            };
            info!("[UNHANDLED_TOPIC] {topic} raw={raw}");
            Routed::Unhandled
        }
    }

    fn on_heartbeat(&self, topic: &str, payload: Payload, received_at: EpochSeconds) -> Routed {
        let mac = decode::<HeartbeatIn>(topic, payload)
            .and_then(|hb| hb.mac)
            .filter(|mac| !mac.is_empty());
        let Some(mac) = mac else {
            debug!("[{topic}] heartbeat without MAC, dropped");
            return Routed::Dropped;
        };

        match self.tracker.on_heartbeat(&mac, received_at) {
            Ok(outcome) => Routed::Heartbeat(outcome),
            Err(_) => Routed::OutOfOrder,
        }
    }

    fn alert(&self, alert: DeviceAlert) -> Routed {
        if let Some(log) = &self.event_log {
            log.record(&alert);
        }
        Routed::Alert(alert)
    }
}

fn decode<T: serde::de::DeserializeOwned>(topic: &str, payload: Payload) -> Option<T> {
    match payload {
        Payload::Json(v) => match serde_json::from_value(v) {
            Ok(msg) => Some(msg),
            Err(e) => {
                error!("[{topic}] payload parse error: {e}");
                None
            }
        },
        Payload::Text(raw) => {
            error!("[{topic}] payload parse error: not JSON: {raw}");
            None
        }
    }
}

/// Poll the broker until `shutdown` fires. Subscriptions are renewed on
/// every ConnAck so a reconnect picks them up again.
pub fn spawn_mqtt_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    subscriptions: Vec<String>,
    qos: QoS,
    dispatcher: Arc<Dispatcher>,
    health: HealthTracker,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("[mqtt] connected");
                        health.mark_mqtt_connected();
                        for topic in &subscriptions {
                            match client.try_subscribe(topic.as_str(), qos) {
                                Ok(()) => info!("[mqtt] subscribe qos={qos:?} topic={topic}"),
                                Err(e) => error!("[mqtt] subscribe {topic} failed: {e}"),
                            }
                        }
                    }
                    Ok(Event::Incoming(Incoming::Publish(p))) => {
                        dispatcher.handle(&p.topic, &p.payload, p.retain, heartwatch_core::epoch_now());
                    }
                    Ok(Event::Incoming(Incoming::Disconnect)) => {
                        warn!("[mqtt] disconnected by broker");
                        health.mark_mqtt_disconnected();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("[mqtt] connection error: {e}, retry in {}s", RECONNECT_DELAY.as_secs());
                        health.increment_reconnects();
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            debug!("[mqtt] disconnect request failed: {e}");
        }
        let _ = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await;
        health.mark_mqtt_disconnected();
        info!("[mqtt] listener stopped");
    })
}
