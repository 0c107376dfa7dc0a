use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use serde_json::{Value, json};
use tower::ServiceExt;

use traffic_monitor::{
    Clock, Engine,
    server::{AppState, router},
    signals::SignalStore,
};

struct FrozenClock;

impl Clock for FrozenClock {
    fn now(&self) -> chrono::DateTime<Utc> {
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }
}

fn engine() -> Arc<Engine> {
    Arc::new(Engine::new(
        SignalStore::with_default_signals(),
        Box::new(StdRng::seed_from_u64(99)),
        Arc::new(FrozenClock),
    ))
}

fn app(engine: Arc<Engine>) -> Router {
    router(AppState::new(engine, 8))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn put(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get(app(engine()), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn traffic_data_returns_full_snapshot() {
    let engine = engine();
    engine.tick().await;
    let (status, body) = get(app(engine.clone()), "/api/traffic/data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signals"].as_array().unwrap().len(), 4);
    assert_eq!(body["trafficData"].as_array().unwrap().len(), 4);
    assert_eq!(
        body["vehicles"].as_array().unwrap().len(),
        engine.current_snapshot().await.vehicles.len()
    );
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn sample_lookup_by_signal() {
    let (status, body) = get(app(engine()), "/api/traffic/data/S002").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signalId"], "S002");
    assert_eq!(body["congestionLevel"], "high");

    let (status, body) = get(app(engine()), "/api/traffic/data/S999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Signal not found");
}

#[tokio::test]
async fn signal_listing_and_lookup() {
    let engine = engine();
    let (status, body) = get(app(engine.clone()), "/api/signals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);

    let (_, same) = get(app(engine.clone()), "/api/traffic/signals").await;
    assert_eq!(body, same);

    let (status, body) = get(app(engine.clone()), "/api/signals/S001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"]["name"], "Main Street & 1st Avenue");

    let (status, _) = get(app(engine), "/api/signals/S404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_state_updates_signal() {
    let engine = engine();
    let (status, body) = put(
        app(engine.clone()),
        "/api/signals/S001/state",
        json!({ "state": "green" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentState"], "green");

    let (_, body) = get(app(engine), "/api/signals/S001").await;
    assert_eq!(body["currentState"], "green");
}

#[tokio::test]
async fn put_state_rejects_bad_color_and_unknown_signal() {
    let engine = engine();
    let (status, body) = put(
        app(engine.clone()),
        "/api/signals/S001/state",
        json!({ "state": "blue" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid state. Must be red, yellow, or green");

    let (status, _) = put(
        app(engine),
        "/api/signals/S999/state",
        json!({ "state": "red" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_timing_merges_and_validates() {
    let engine = engine();
    let (status, body) = put(
        app(engine.clone()),
        "/api/signals/S003/timing",
        json!({ "timing": { "green": 45 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timing"], json!({ "red": 30, "yellow": 5, "green": 45 }));

    let (status, _) = put(
        app(engine.clone()),
        "/api/signals/S003/timing",
        json!({ "timing": { "yellow": 1 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = put(
        app(engine),
        "/api/signals/S999/timing",
        json!({ "timing": { "red": 20 } }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn vehicles_by_signal() {
    let engine = engine();
    let snapshot = engine.tick().await;
    let expected = snapshot
        .vehicles
        .iter()
        .filter(|v| v.signal_id == "S004")
        .count();

    let (status, body) = get(app(engine.clone()), "/api/vehicles/signal/S004").await;
    assert_eq!(status, StatusCode::OK);
    let vehicles = body.as_array().unwrap();
    assert_eq!(vehicles.len(), expected);
    assert!(vehicles.iter().all(|v| v["signalId"] == "S004"));

    let (status, body) = get(app(engine.clone()), "/api/vehicles/signal/nope").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (_, all) = get(app(engine), "/api/vehicles").await;
    assert_eq!(all.as_array().unwrap().len(), snapshot.vehicles.len());
}

#[tokio::test]
async fn analytics_endpoints() {
    let engine = engine();
    let (status, overview) = get(app(engine.clone()), "/api/analytics/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["totalSignals"], 4);
    assert_eq!(overview["activeSignals"], 4);
    assert_eq!(overview["averageDensity"], 55.0);
    assert_eq!(
        overview["signalsByState"],
        json!({ "red": 2, "yellow": 1, "green": 1 })
    );
    assert_eq!(
        overview["congestionLevels"],
        json!({ "low": 0, "medium": 2, "high": 1, "severe": 1 })
    );

    let (status, hotspots) = get(app(engine), "/api/analytics/hotspots").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = hotspots
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["signalId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["S004", "S002"]);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let engine = engine();
    let cases = [
        ("/api/signals/S001/state", json!({})),
        ("/api/signals/S001/state", json!({ "state": 5 })),
        ("/api/signals/S001/timing", json!({ "timing": { "red": -5 } })),
        ("/api/signals/S001/timing", json!({ "timing": { "red": 12.5 } })),
        ("/api/signals/S001/timing", json!({ "timing": { "red": "long" } })),
    ];

    for (uri, body) in cases {
        let (status, reply) = put(app(engine.clone()), uri, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
        assert!(reply["error"].is_string(), "{uri} {body}");
    }

    let (_, reply) = put(app(engine.clone()), "/api/signals/S001/state", json!({ "state": 5 })).await;
    assert_eq!(reply["error"], "Invalid state. Must be red, yellow, or green");

    let response = app(engine.clone())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/signals/S001/state")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, reply) = read(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], "Malformed payload");

    let (_, signal) = get(app(engine), "/api/signals/S001").await;
    assert_eq!(signal["currentState"], "red");
    assert_eq!(signal["timing"], json!({ "red": 30, "yellow": 5, "green": 25 }));
}
