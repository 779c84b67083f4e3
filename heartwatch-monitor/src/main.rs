/*!
 * HEARTWATCH MONITOR - service entry point
 *
 * Wires config, logging, the heartbeat engine, the MQTT listener, the
 * watchdog and the status API, then runs until Ctrl-C. Shutdown stops the watchdog,
 * disconnects from the broker and drains the HTTP server.
 */

mod config;
mod display;
mod event_log;
mod handlers;
mod health;
mod http;
mod logging;
mod models;
mod mqtt;
mod notify;
mod sink;

use anyhow::{Context, Result};
use heartwatch_core::{DeviceRegistry, HeartbeatTracker, WatchdogSweeper};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::load_config;
use crate::event_log::EventLog;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::mqtt::Dispatcher;
use crate::notify::EmailNotifier;
use crate::sink::MonitorSink;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Config comes first: the file log needs its path and the display clock.
    let (cfg, source) = load_config().await;
    let clock = cfg.display.clock().context("invalid display offsets")?;
    logging::init(cfg.log_file.as_ref(), clock);
    source.log();

    let window = cfg.heartbeat.window().context("invalid heartbeat settings")?;
    info!(
        "[monitor] nominal={}s tolerance={}s broker={}:{}",
        window.nominal_period(),
        window.tolerance(),
        cfg.mqtt.host,
        cfg.mqtt.port
    );

    let event_log = match &cfg.events_log {
        Some(path) => match EventLog::open(path) {
            Ok(log) => {
                info!("[monitor] event log at {path}");
                Some(Arc::new(log))
            }
            Err(e) => {
                error!("[monitor] cannot open event log {path}: {e}, continuing without it");
                None
            }
        },
        None => None,
    };

    let health = HealthTracker::new();
    let registry = Arc::new(DeviceRegistry::new());
    let (client, eventloop) = mqtt::create_mqtt_client(&cfg.mqtt);

    let mut sink = MonitorSink::new(
        client.clone(),
        cfg.topics.heartbeat.clone(),
        cfg.topics.timeout_alert.clone(),
        clock,
        event_log.clone(),
        health.clone(),
    );
    if cfg.email.enabled {
        match EmailNotifier::spawn(&cfg.email) {
            Ok(notifier) => {
                info!("[EMAIL] restart notices go to {}", cfg.email.recipients.join(", "));
                sink = sink.with_notifier(Arc::new(notifier));
            }
            Err(e) => error!("[EMAIL] notifier disabled: {e}"),
        }
    }
    let sink = Arc::new(sink);
    let tracker = HeartbeatTracker::new(registry.clone(), window, sink.clone());
    let sweeper = Arc::new(WatchdogSweeper::new(registry.clone(), window, sink));
    let dispatcher = Arc::new(
        Dispatcher::new(cfg.topics.clone(), tracker, clock, event_log)
            .with_ping_problem(cfg.ping_problem.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener_task = mqtt::spawn_mqtt_listener(
        client,
        eventloop,
        cfg.topics.subscriptions(),
        cfg.mqtt.qos(),
        dispatcher,
        health.clone(),
        shutdown_rx.clone(),
    );
    let watchdog_task = sweeper.clone().spawn(shutdown_rx);

    let app = http::build_router(AppState {
        registry,
        window,
        sweeper,
        health,
        clock,
        api_key: std::env::var("HEARTWATCH_API_KEY").ok().filter(|k| !k.is_empty()),
    });

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("cannot bind {}", cfg.http.bind))?;
    info!("[monitor] listening on http://{}", cfg.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("[monitor] ctrl-c handler failed: {e}");
            }
            info!("[monitor] shutting down");
        })
        .await
        .context("http server failed")?;

    shutdown_tx.send(true).ok();
    if let Err(e) = watchdog_task.await {
        error!("[monitor] watchdog task ended abnormally: {e}");
    }
    if let Err(e) = listener_task.await {
        error!("[monitor] mqtt task ended abnormally: {e}");
    }

    info!("[monitor] stopped");
    Ok(())
}
