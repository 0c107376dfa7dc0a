//! REST and WebSocket surface over the [`Engine`].
//!
//! Every handler is a thin passthrough: reads come from the current
//! snapshot, writes go through the engine's targeted mutations.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    engine::Engine,
    error::EngineError,
    model::{AnalyticsOverview, Hotspot, Signal, SignalColor, Snapshot, TimingUpdate, TrafficSample, Vehicle},
};

/// Client text frame asking for the current snapshot.
pub const REQUEST_EVENT: &str = "request-traffic-data";
/// Event name for the reply to [`REQUEST_EVENT`].
pub const DATA_EVENT: &str = "traffic-data";
/// Event name for snapshots pushed on every tick.
pub const UPDATE_EVENT: &str = "traffic-update";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub subscriber_buffer: usize,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, subscriber_buffer: usize) -> Self {
        AppState {
            engine,
            subscriber_buffer,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MalformedPayload => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Engine(EngineError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Signal not found".to_string())
            }
            ApiError::Engine(e @ EngineError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/traffic/data", get(traffic_data))
        .route("/api/traffic/data/:signal_id", get(traffic_sample))
        .route("/api/traffic/signals", get(list_signals))
        .route("/api/traffic/vehicles", get(list_vehicles))
        .route("/api/signals", get(list_signals))
        .route("/api/signals/:signal_id", get(get_signal))
        .route("/api/signals/:signal_id/timing", put(update_timing))
        .route("/api/signals/:signal_id/state", put(update_state))
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/signal/:signal_id", get(vehicles_for_signal))
        .route("/api/analytics/overview", get(overview))
        .route("/api/analytics/hotspots", get(hotspots))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Restrict to one origin when given, otherwise allow any.
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };

    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE]))
}

// ===== REST handlers =====

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Traffic Management System Running",
    }))
}

async fn traffic_data(State(state): State<AppState>) -> Json<Arc<Snapshot>> {
    Json(state.engine.current_snapshot().await)
}

async fn traffic_sample(
    State(state): State<AppState>,
    Path(signal_id): Path<String>,
) -> Result<Json<TrafficSample>, ApiError> {
    state
        .engine
        .current_snapshot()
        .await
        .traffic_data
        .iter()
        .find(|s| s.signal_id == signal_id)
        .cloned()
        .map(Json)
        .ok_or(EngineError::NotFound(signal_id).into())
}

async fn list_signals(State(state): State<AppState>) -> Json<Vec<Signal>> {
    Json(state.engine.current_snapshot().await.signals.clone())
}

async fn get_signal(
    State(state): State<AppState>,
    Path(signal_id): Path<String>,
) -> Result<Json<Signal>, ApiError> {
    match state.engine.signal(&signal_id).await {
        Some(signal) => Ok(Json(signal)),
        None => Err(EngineError::NotFound(signal_id).into()),
    }
}

// Body fields are taken loosely and checked here, so every bad value turns
// into an `ApiError` with a JSON body.
#[derive(Deserialize)]
struct TimingBody {
    #[serde(default)]
    timing: RawTiming,
}

#[derive(Deserialize, Default)]
struct RawTiming {
    red: Option<f64>,
    yellow: Option<f64>,
    green: Option<f64>,
}

impl TryFrom<RawTiming> for TimingUpdate {
    type Error = EngineError;

    fn try_from(raw: RawTiming) -> Result<Self, Self::Error> {
        Ok(TimingUpdate {
            red: whole_seconds("red", raw.red)?,
            yellow: whole_seconds("yellow", raw.yellow)?,
            green: whole_seconds("green", raw.green)?,
        })
    }
}

fn whole_seconds(color: &str, value: Option<f64>) -> Result<Option<u32>, EngineError> {
    match value {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&v) => {
            Ok(Some(v as u32))
        }
        Some(v) => Err(EngineError::InvalidArgument(format!(
            "{color} duration must be a whole number of seconds, got {v}"
        ))),
    }
}

async fn update_timing(
    State(state): State<AppState>,
    Path(signal_id): Path<String>,
    body: Bytes,
) -> Result<Json<Signal>, ApiError> {
    let body: TimingBody = serde_json::from_slice(&body).map_err(|_| ApiError::MalformedPayload)?;
    let timing = TimingUpdate::try_from(body.timing)?;
    let signal = state.engine.set_signal_timing(&signal_id, timing).await?;
    Ok(Json(signal))
}

#[derive(Deserialize)]
struct StateBody {
    #[serde(default)]
    state: serde_json::Value,
}

async fn update_state(
    State(state): State<AppState>,
    Path(signal_id): Path<String>,
    body: Bytes,
) -> Result<Json<Signal>, ApiError> {
    let body: StateBody = serde_json::from_slice(&body).map_err(|_| ApiError::MalformedPayload)?;
    // Missing or non-string states fail the same way as unknown colors.
    let color: SignalColor = body.state.as_str().unwrap_or_default().parse()?;
    let signal = state.engine.set_signal_state(&signal_id, color).await?;
    Ok(Json(signal))
}

async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<Vehicle>> {
    Json(state.engine.current_snapshot().await.vehicles.clone())
}

async fn vehicles_for_signal(
    State(state): State<AppState>,
    Path(signal_id): Path<String>,
) -> Json<Vec<Vehicle>> {
    let snapshot = state.engine.current_snapshot().await;
    Json(
        snapshot
            .vehicles
            .iter()
            .filter(|v| v.signal_id == signal_id)
            .cloned()
            .collect(),
    )
}

async fn overview(State(state): State<AppState>) -> Json<AnalyticsOverview> {
    Json(state.engine.compute_overview().await)
}

async fn hotspots(State(state): State<AppState>) -> Json<Vec<Hotspot>> {
    Json(state.engine.compute_hotspots().await)
}

// ===== WebSocket =====

#[derive(Serialize)]
struct Event<'a> {
    event: &'a str,
    data: &'a Snapshot,
}

#[derive(Deserialize)]
struct ClientEvent {
    event: String,
}

fn is_snapshot_request(text: &str) -> bool {
    let text = text.trim();
    text == REQUEST_EVENT
        || serde_json::from_str::<ClientEvent>(text).is_ok_and(|e| e.event == REQUEST_EVENT)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws_client(socket, state))
}

async fn handle_ws_client(socket: WebSocket, state: AppState) {
    let mut subscription = state.engine.subscribe_channel(state.subscriber_buffer).await;
    let id = subscription.id;
    let (mut sender, mut receiver) = socket.split();

    info!("Client connected: {}", id);

    loop {
        tokio::select! {
            snapshot = subscription.rx.recv() => {
                let Some(snapshot) = snapshot else { break };
                if !send_event(&mut sender, UPDATE_EVENT, &snapshot).await {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) if is_snapshot_request(&text) => {
                        let snapshot = state.engine.current_snapshot().await;
                        if !send_event(&mut sender, DATA_EVENT, &snapshot).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.engine.unsubscribe(id).await;
    info!("Client disconnected: {}", id);
}

/// Returns `false` once the client can no longer be served.
async fn send_event<S>(sender: &mut S, event: &str, snapshot: &Snapshot) -> bool
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(&Event {
        event,
        data: snapshot,
    }) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to encode {} event: {}", event, e);
            return false;
        }
    };

    sender.send(Message::Text(json)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_request_accepts_plain_and_json_frames() {
        assert!(is_snapshot_request("request-traffic-data"));
        assert!(is_snapshot_request(" request-traffic-data\n"));
        assert!(is_snapshot_request(r#"{"event":"request-traffic-data"}"#));
        assert!(!is_snapshot_request(r#"{"event":"something-else"}"#));
        assert!(!is_snapshot_request("hello"));
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::from(EngineError::NotFound("S9".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_argument_maps_to_400() {
        let response =
            ApiError::from(EngineError::InvalidArgument("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_payload_maps_to_400() {
        let response = ApiError::MalformedPayload.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timing_values_must_be_whole_non_negative_seconds() {
        assert_eq!(whole_seconds("red", None), Ok(None));
        assert_eq!(whole_seconds("red", Some(45.0)), Ok(Some(45)));
        assert!(whole_seconds("red", Some(-5.0)).is_err());
        assert!(whole_seconds("red", Some(12.5)).is_err());
        assert!(whole_seconds("red", Some(1e12)).is_err());
    }

    #[test]
    fn cors_layer_rejects_malformed_origin() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://example.org")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
