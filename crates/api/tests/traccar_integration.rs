//! Integration tests for the Traccar client against a local stub server.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use domain::error::CoreError;
use domain::models::NewEquipment;
use domain::services::PullSource;
use fieldzone_api::config::TraccarConfig;
use fieldzone_api::jobs::{Job, PositionRefreshJob};
use fieldzone_api::services::TraccarClient;
use persistence::MemoryStore;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

const TOKEN: &str = "stub-token";

/// Fixed reference time, so repeated polls return identical fixes.
fn base_time() -> DateTime<Utc> {
    static BASE: OnceLock<DateTime<Utc>> = OnceLock::new();
    *BASE.get_or_init(Utc::now)
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {TOKEN}"))
}

async fn devices(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        {"id": 1, "name": "Tractor A", "uniqueId": "868000001"},
        {"id": 2, "name": "Tractor B", "uniqueId": "868000002"},
        {"name": "no id"}
    ]))
    .into_response()
}

async fn positions(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !params.contains_key("from") || !params.contains_key("to") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let recent = |minutes: i64| {
        (base_time() - Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Secs, true)
    };
    match params.get("deviceId").map(String::as_str) {
        Some("1") => Json(json!([
            {
                "latitude": 45.0,
                "longitude": 4.0,
                "deviceTime": recent(30),
                "speed": 10.0,
                "attributes": {"batteryPercent": 0.5}
            },
            {
                "latitude": 45.0005,
                "longitude": 4.0005,
                "fixTime": recent(20),
                "speed": 0.0,
                "attributes": {"batteryLevel": 48}
            },
            {"deviceTime": recent(10), "attributes": {}}
        ]))
        .into_response(),
        Some("2") => StatusCode::NOT_FOUND.into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Serves the stub and returns its base URL.
async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/api/devices", get(devices))
        .route("/api/positions", get(positions));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: String, device_name: Option<&str>) -> TraccarClient {
    TraccarClient::new(TraccarConfig {
        base_url,
        token: TOKEN.to_string(),
        device_name: device_name.map(str::to_string),
        timeout_ms: 2_000,
        lookback_hours: 24,
    })
    .unwrap()
}

async fn pull_equipment(store: &MemoryStore, pull_id: i64) -> domain::models::Equipment {
    store
        .stores()
        .equipment
        .find_or_create_by_pull_id(&NewEquipment::from_pull(pull_id, "stub"))
        .await
        .unwrap()
        .0
}

#[tokio::test]
async fn test_devices_skip_malformed_entries() {
    let source = client(spawn_stub().await, None);
    let devices = assert_ok!(source.fetch_devices().await);
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, 1);
    assert_eq!(devices[0].unique_id.as_deref(), Some("868000001"));
}

#[tokio::test]
async fn test_devices_filtered_by_name() {
    let source = client(spawn_stub().await, Some("Tractor B"));
    let devices = assert_ok!(source.fetch_devices().await);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, 2);
}

#[tokio::test]
async fn test_positions_are_normalized() {
    let source = client(spawn_stub().await, None);
    let store = MemoryStore::new();
    let equipment = pull_equipment(&store, 1).await;

    let now = Utc::now();
    let fixes = source
        .fetch_positions(&equipment, now - Duration::hours(1), now)
        .await
        .unwrap();
    // The element without coordinates is dropped.
    assert_eq!(fixes.len(), 2);
    assert!((fixes[0].speed.unwrap() - 18.52).abs() < 1e-9);
    assert_eq!(fixes[0].battery_level, Some(50));
    assert_eq!(fixes[1].speed, Some(0.0));
    assert_eq!(fixes[1].battery_level, Some(48));
    assert!(fixes[0].timestamp < fixes[1].timestamp);
}

#[tokio::test]
async fn test_not_found_means_no_positions() {
    let source = client(spawn_stub().await, None);
    let store = MemoryStore::new();
    let equipment = pull_equipment(&store, 2).await;

    let now = Utc::now();
    let fixes = source
        .fetch_positions(&equipment, now - Duration::hours(1), now)
        .await
        .unwrap();
    assert!(fixes.is_empty());
}

#[tokio::test]
async fn test_server_error_is_source_unavailable() {
    let source = client(spawn_stub().await, None);
    let store = MemoryStore::new();
    let equipment = pull_equipment(&store, 99).await;

    let now = Utc::now();
    let err = assert_err!(
        source
            .fetch_positions(&equipment, now - Duration::hours(1), now)
            .await
    );
    assert!(matches!(err, CoreError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_bad_token_is_source_unavailable() {
    let source = TraccarClient::new(TraccarConfig {
        base_url: spawn_stub().await,
        token: "wrong".to_string(),
        ..TraccarConfig::default()
    })
    .unwrap();

    let err = assert_err!(source.fetch_devices().await);
    assert!(matches!(err, CoreError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_connection_refused_is_source_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = client(format!("http://{addr}"), None);
    let err = assert_err!(source.fetch_devices().await);
    assert!(matches!(err, CoreError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_refresh_job_provisions_and_stores() {
    let source: Arc<dyn PullSource> = Arc::new(client(spawn_stub().await, None));
    let store = MemoryStore::new();
    let job = PositionRefreshJob::new(source, store.stores(), 24, 60);

    assert_ok!(job.execute().await);

    let stores = store.stores();
    let equipment = stores.equipment.list_pull_sourced().await.unwrap();
    assert_eq!(equipment.len(), 2);

    let tractor_a = equipment.iter().find(|e| e.pull_id == Some(1)).unwrap();
    assert_eq!(tractor_a.name, "Tractor A");
    let tractor_a = stores.equipment.find_by_id(tractor_a.id).await.unwrap().unwrap();
    assert_eq!(tractor_a.battery_level, Some(48));
    let latest = stores.positions.latest(tractor_a.id).await.unwrap().unwrap();
    assert_eq!(latest.latitude, 45.0005);

    // Second pass only asks for newer fixes; nothing is duplicated.
    assert_ok!(job.execute().await);
    let now = Utc::now();
    let stored = stores
        .positions
        .list_between(tractor_a.id, now - Duration::hours(2), now)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}
