use heartwatch_core::{ConfigError, IntervalWindow};
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{error, info, warn};

use crate::display::{DisplayClock, DisplayError};
use crate::handlers::DEFAULT_PING_PROBLEM;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub mqtt: MqttConf,
    pub topics: TopicsConf,
    pub heartbeat: HeartbeatConf,
    pub display: DisplayConf,
    /// Append-only JSON Lines record of every event; `null` disables it.
    pub events_log: Option<String>,
    /// Size-rotated text log read by the daily report; `null` disables it.
    pub log_file: Option<LogFileConf>,
    pub email: EmailConf,
    /// `< Problem: ... >` text of ping-status warnings.
    pub ping_problem: String,
    pub http: HttpConf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            topics: TopicsConf::default(),
            heartbeat: HeartbeatConf::default(),
            display: DisplayConf::default(),
            events_log: Some("monitor_events.jsonl".into()),
            log_file: Some(LogFileConf::default()),
            email: EmailConf::default(),
            ping_problem: DEFAULT_PING_PROBLEM.into(),
            http: HttpConf::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub sub_qos: u8,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "heartwatch-monitor".into(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            sub_qos: 0,
        }
    }
}

impl MqttConf {
    pub fn qos(&self) -> QoS {
        match self.sub_qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TopicsConf {
    pub heartbeat: String,
    pub do_off: String,
    pub ping: String,
    /// Outbound SERIOUS_TIMEOUT alerts, picked up by the SMS gateway.
    pub timeout_alert: String,
}

impl Default for TopicsConf {
    fn default() -> Self {
        Self {
            heartbeat: "/SKE_SOLAR/slave_1hour/Morriset/".into(),
            do_off: "/SKE_SOLAR/SLAVE_BECOME_0".into(),
            ping: "/SKE_SOLAR/M300_ping".into(),
            timeout_alert: "/monitor_send_sms/SERIOUS_TIMEOUT".into(),
        }
    }
}

impl TopicsConf {
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.do_off.clone(), self.ping.clone(), self.heartbeat.clone()]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HeartbeatConf {
    pub nominal_period_secs: f64,
    pub tolerance_secs: f64,
}

impl Default for HeartbeatConf {
    fn default() -> Self {
        let window = IntervalWindow::default();
        Self {
            nominal_period_secs: window.nominal_period(),
            tolerance_secs: window.tolerance(),
        }
    }
}

impl HeartbeatConf {
    pub fn window(&self) -> Result<IntervalWindow, ConfigError> {
        IntervalWindow::new(self.nominal_period_secs, self.tolerance_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConf {
    /// Offset of the naive timestamps written by the gateways.
    pub source_utc_offset_hours: i8,
    /// Offset used for every timestamp shown in logs, alerts and the API.
    pub display_utc_offset_hours: i8,
}

impl Default for DisplayConf {
    fn default() -> Self {
        Self {
            source_utc_offset_hours: 8,
            display_utc_offset_hours: 11,
        }
    }
}

impl DisplayConf {
    pub fn clock(&self) -> Result<DisplayClock, DisplayError> {
        DisplayClock::new(self.source_utc_offset_hours, self.display_utc_offset_hours)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

pub fn parse_config(txt: &str) -> Result<MonitorConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(MonitorConfig::default());
    }
    serde_yaml::from_str(txt)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogFileConf {
    pub path: String,
    /// Rotate once the file grows past this size.
    pub max_bytes: usize,
    /// Rotated files kept as `<path>.1` .. `<path>.<backups>`.
    pub backups: usize,
}

impl Default for LogFileConf {
    fn default() -> Self {
        Self {
            path: "monitor_log".into(),
            max_bytes: 5 * 1024 * 1024,
            backups: 2,
        }
    }
}

/// Mail sent when a device restart is confirmed.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EmailConf {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// TLS from the first byte (port 465); `false` upgrades with STARTTLS.
    pub implicit_tls: bool,
    pub username: Option<String>,
    /// Falls back to `$SMTP_PASSWORD` so the secret can stay out of the file.
    pub password: Option<String>,
    /// Defaults to `username`.
    pub from: Option<String>,
    pub recipients: Vec<String>,
    pub subject_prefix: String,
}

impl Default for EmailConf {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 465,
            implicit_tls: true,
            username: None,
            password: None,
            from: None,
            recipients: Vec::new(),
            subject_prefix: "Heartwatch Monitor - Do not reply".into(),
        }
    }
}

impl EmailConf {
    pub fn password(&self) -> Option<String> {
        self.password
            .clone()
            .or_else(|| std::env::var("SMTP_PASSWORD").ok().filter(|p| !p.is_empty()))
    }
}

/// Where the running config came from. Logged once the subscriber is up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(String),
    Missing(String),
    Unreadable { path: String, error: String },
    Invalid { path: String, error: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("[monitor] config loaded from {path}"),
            ConfigSource::Missing(path) => warn!("[monitor] no {path}, using default config"),
            ConfigSource::Unreadable { path, error } => {
                error!("[monitor] cannot read config {path}: {error}, using defaults")
            }
            ConfigSource::Invalid { path, error } => {
                error!("[monitor] invalid config {path}: {error}, using defaults")
            }
        }
    }
}

pub async fn read_config(path: &str) -> (MonitorConfig, ConfigSource) {
    if !Path::new(path).exists() {
        return (MonitorConfig::default(), ConfigSource::Missing(path.into()));
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            let source = ConfigSource::Unreadable {
                path: path.into(),
                error: e.to_string(),
            };
            return (MonitorConfig::default(), source);
        }
    };

    match parse_config(&txt) {
        Ok(cfg) => (cfg, ConfigSource::File(path.into())),
        Err(e) => {
            let source = ConfigSource::Invalid {
                path: path.into(),
                error: e.to_string(),
            };
            (MonitorConfig::default(), source)
        }
    }
}

/// `$HEARTWATCH_CONFIG`, else `heartwatch.yaml`.
pub async fn load_config() -> (MonitorConfig, ConfigSource) {
    let path = std::env::var("HEARTWATCH_CONFIG").unwrap_or_else(|_| "heartwatch.yaml".into());
    read_config(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_deployment() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.heartbeat.nominal_period_secs, 3600.0);
        assert_eq!(cfg.heartbeat.tolerance_secs, 300.0);
        assert_eq!(cfg.topics.timeout_alert, "/monitor_send_sms/SERIOUS_TIMEOUT");
        assert_eq!(cfg.mqtt.qos(), QoS::AtMostOnce);
        assert_eq!(cfg.events_log.as_deref(), Some("monitor_events.jsonl"));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let cfg = parse_config(
            "mqtt:\n  host: 10.10.9.2\nheartbeat:\n  nominal_period_secs: 600\n  tolerance_secs: 120\nevents_log: null\n",
        )
        .unwrap();

        assert_eq!(cfg.mqtt.host, "10.10.9.2");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.heartbeat.window().unwrap().timeout_threshold(), 900.0);
        assert_eq!(cfg.topics.heartbeat, "/SKE_SOLAR/slave_1hour/Morriset/");
        assert!(cfg.events_log.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let cfg = parse_config("  \n").unwrap();
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
    }

    #[test]
    fn invalid_window_is_reported() {
        let cfg = parse_config("heartbeat:\n  nominal_period_secs: 100\n  tolerance_secs: 100\n").unwrap();
        assert!(cfg.heartbeat.window().is_err());
    }

    #[test]
    fn subscriptions_cover_inbound_topics() {
        let topics = TopicsConf::default();
        let subs = topics.subscriptions();
        assert_eq!(subs.len(), 3);
        assert!(!subs.contains(&topics.timeout_alert));
    }
    #[test]
    fn email_and_log_file_sections() {
        let cfg = parse_config(
            "email:\n  enabled: true\n  smtp_host: mail.example.com\n  username: support@example.com\n  recipients: [ops@example.com]\nlog_file:\n  max_bytes: 1024\nping_problem: Slave Ping 10.0.0.9 False\n",
        )
        .unwrap();

        assert!(cfg.email.enabled);
        assert_eq!(cfg.email.smtp_port, 465);
        assert!(cfg.email.implicit_tls);
        assert_eq!(cfg.email.recipients, vec!["ops@example.com"]);
        let log_file = cfg.log_file.unwrap();
        assert_eq!(log_file.path, "monitor_log");
        assert_eq!(log_file.max_bytes, 1024);
        assert_eq!(log_file.backups, 2);
        assert_eq!(cfg.ping_problem, "Slave Ping 10.0.0.9 False");
    }

    #[test]
    fn log_file_defaults_follow_field_rotation() {
        let cfg = MonitorConfig::default();
        let log_file = cfg.log_file.unwrap();
        assert_eq!(log_file.max_bytes, 5 * 1024 * 1024);
        assert_eq!(log_file.backups, 2);
        assert!(!cfg.email.enabled);
        assert_eq!(cfg.ping_problem, "Slave Ping 10.10.9.2 False");
    }

    #[tokio::test]
    async fn read_config_reports_where_it_came_from() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.yaml");
        let (_, source) = read_config(missing.to_str().unwrap()).await;
        assert!(matches!(source, ConfigSource::Missing(_)));

        let good = dir.path().join("good.yaml");
        std::fs::write(&good, "http:\n  bind: 127.0.0.1:9000\n").unwrap();
        let (cfg, source) = read_config(good.to_str().unwrap()).await;
        assert!(matches!(source, ConfigSource::File(_)));
        assert_eq!(cfg.http.bind, "127.0.0.1:9000");

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "http: [not, a, map]\n").unwrap();
        let (cfg, source) = read_config(bad.to_str().unwrap()).await;
        assert!(matches!(source, ConfigSource::Invalid { .. }));
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn unreadable_config_is_not_silently_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        // a directory exists but cannot be read as text
        let (cfg, source) = read_config(dir.path().to_str().unwrap()).await;
        match source {
            ConfigSource::Unreadable { error, .. } => assert!(!error.is_empty()),
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
    }
}
