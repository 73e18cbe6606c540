//! Common test utilities for integration tests.
//!
//! The router is built over the in-memory store, so no database is needed.

// Not every integration test uses every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use domain::models::{NewEquipment, NewPosition, PositionSource};
use domain::services::Stores;
use fieldzone_api::{
    app::{create_app, AppState},
    config::{
        AnalysisConfig, Config, DatabaseConfig, LoggingConfig, PushConfig, SchedulerConfig,
        ServerConfig, TraccarConfig,
    },
};
use persistence::MemoryStore;

/// Test configuration; no token required, auto-provisioning on.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        traccar: TraccarConfig::default(),
        push: PushConfig {
            max_body_size: 64 * 1024,
            ..PushConfig::default()
        },
        analysis: AnalysisConfig::default(),
        scheduler: SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        },
    }
}

/// Application under test plus a handle on its store.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub state: AppState,
}

impl TestApp {
    pub fn stores(&self) -> Stores {
        self.store.stores()
    }
}

pub fn create_test_app(config: Config) -> TestApp {
    let store = MemoryStore::new();
    let state = AppState::new(config, store.stores());
    TestApp {
        router: create_app(state.clone()),
        store,
        state,
    }
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// `n x n` grid of fixes at ~10 m spacing, one every 30 s from `start`.
pub fn grid(start: DateTime<Utc>, n: u32, lat: f64, lon: f64) -> Vec<NewPosition> {
    let mut fixes = Vec::new();
    for i in 0..n {
        for j in 0..n {
            fixes.push(NewPosition {
                latitude: lat + f64::from(i) * 0.00009,
                longitude: lon + f64::from(j) * 0.000127,
                timestamp: start + Duration::seconds(i64::from(i * n + j) * 30),
                speed: None,
                battery_level: None,
                source: PositionSource::Push,
            });
        }
    }
    fixes
}

/// Creates push equipment and stores `fixes` for it.
pub async fn seed_equipment(app: &TestApp, push_id: &str, fixes: &[NewPosition]) -> i64 {
    let stores = app.stores();
    let (equipment, _) = stores
        .equipment
        .find_or_create_by_push_id(&NewEquipment::from_push(push_id, true, None))
        .await
        .unwrap();
    stores.positions.insert_many(equipment.id, fixes).await.unwrap();
    equipment.id
}
