/*!
 * STATUS API - read-only HTTP view of the monitor
 *
 * Routes:
 * - /health           liveness, always open
 * - /system/health    counters from the health tracker
 * - /devices          every tracked device with its history
 * - /devices/{id}     one device, 404 when never seen
 *
 * When an API key is configured every route except /health requires the
 * `x-api-key` header.
 */

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use heartwatch_core::{epoch_now, DeviceRegistry, DeviceSnapshot, IntervalWindow, WatchdogSweeper};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::display::DisplayClock;
use crate::health::{HealthTracker, MonitorHealth};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub window: IntervalWindow,
    pub sweeper: Arc<WatchdogSweeper>,
    pub health: HealthTracker,
    pub clock: DisplayClock,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeviceView {
    mac: String,
    last_seen: String,
    last_seen_epoch: f64,
    silent_for_seconds: f64,
    /// Past the watchdog threshold; the next sweep reports it.
    timed_out: bool,
    history: Vec<String>,
}

fn to_view(snapshot: DeviceSnapshot, window: &IntervalWindow, clock: &DisplayClock) -> DeviceView {
    let silent = (epoch_now() - snapshot.last_seen).max(0.0);
    DeviceView {
        last_seen: clock.format_epoch(snapshot.last_seen),
        last_seen_epoch: snapshot.last_seen,
        silent_for_seconds: (silent * 10.0).round() / 10.0,
        timed_out: silent > window.timeout_threshold(),
        history: snapshot.history.iter().map(|ts| clock.format_epoch(*ts)).collect(),
        mac: snapshot.device_id,
    }
}

async fn require_api_key(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    // liveness stays open for health checkers
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !ok {
        warn!("[http] rejected {} without valid api key", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/devices", get(get_devices))
        .route("/devices/{id}", get(get_device))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<MonitorHealth> {
    Json(app.health.get_health(&app.registry, &app.sweeper))
}

// GET /devices
async fn get_devices(State(app): State<AppState>) -> Json<Vec<DeviceView>> {
    let list = app
        .registry
        .snapshots()
        .into_iter()
        .map(|s| to_view(s, &app.window, &app.clock))
        .collect();
    Json(list)
}

// GET /devices/{id}
async fn get_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, StatusCode> {
    let snapshot = app.registry.snapshot(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(to_view(snapshot, &app.window, &app.clock)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use heartwatch_devkit::RecordingSink;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state(api_key: Option<&str>) -> AppState {
        let registry = Arc::new(DeviceRegistry::new());
        let window = IntervalWindow::new(600.0, 120.0).unwrap();
        let sweeper = Arc::new(WatchdogSweeper::new(
            registry.clone(),
            window,
            Arc::new(RecordingSink::new()),
        ));
        AppState {
            registry,
            window,
            sweeper,
            health: HealthTracker::new(),
            clock: DisplayClock::new(8, 0).unwrap(),
            api_key: api_key.map(str::to_string),
        }
    }

    async fn get_json(app: Router, uri: &str, key: Option<&str>) -> (StatusCode, Option<Value>) {
        let mut req = Request::builder().uri(uri);
        if let Some(key) = key {
            req = req.header("x-api-key", key);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[tokio::test]
    async fn lists_devices_sorted_with_history() {
        let app_state = state(None);
        let window = app_state.window;
        let now = epoch_now();
        app_state.registry.record_arrival("b", now - 10.0, &window).unwrap();
        app_state.registry.record_arrival("a", now - 2000.0, &window).unwrap();
        app_state.registry.record_arrival("a", now - 1400.0, &window).unwrap();

        let (status, body) = get_json(build_router(app_state), "/devices", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.unwrap();
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["mac"], "a");
        assert_eq!(list[0]["history"].as_array().unwrap().len(), 2);
        assert_eq!(list[0]["timed_out"], true);
        assert_eq!(list[1]["mac"], "b");
        assert_eq!(list[1]["timed_out"], false);
    }

    #[tokio::test]
    async fn unknown_device_is_404() {
        let (status, _) = get_json(build_router(state(None)), "/devices/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn device_detail_uses_display_clock() {
        let app_state = state(None);
        let window = app_state.window;
        app_state.registry.record_arrival("a", 1_770_163_200.0, &window).unwrap();

        let (status, body) = get_json(build_router(app_state), "/devices/a", None).await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["last_seen"], "2026-02-04 00:00:00");
        assert_eq!(body["last_seen_epoch"], 1_770_163_200.0);
    }

    #[tokio::test]
    async fn system_health_reports_counters() {
        let app_state = state(None);
        let window = app_state.window;
        app_state.registry.record_arrival("a", 0.0, &window).unwrap();
        app_state.sweeper.sweep(10.0);
        app_state.health.record_alert_published();

        let (status, body) = get_json(build_router(app_state), "/system/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["devices_tracked"], 1);
        assert_eq!(body["sweeps"], 1);
        assert_eq!(body["alerts_published"], 1);
        assert_eq!(body["mqtt_status"], "connecting");
    }

    #[tokio::test]
    async fn api_key_guards_everything_but_liveness() {
        let app = build_router(state(Some("secret")));

        let (status, _) = get_json(app.clone(), "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_json(app.clone(), "/devices", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = get_json(app.clone(), "/devices", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = get_json(app, "/devices", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
