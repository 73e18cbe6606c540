use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::Stores;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    decompression::RequestDecompressionLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{analysis, equipment, health, push};
use crate::services::{AnalysisService, IngestService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub ingest: IngestService,
    pub analysis: AnalysisService,
}

impl AppState {
    /// Wires the services over `stores`.
    ///
    /// The analysis service carries the per-equipment locks, so the
    /// scheduler must be given this same instance.
    pub fn new(config: Config, stores: Stores) -> Self {
        let ingest = IngestService::new(stores.clone(), config.push.clone());
        let analysis = AnalysisService::new(stores.clone(), &config.analysis);
        Self {
            config: Arc::new(config),
            stores,
            ingest,
            analysis,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Device-facing ingestion; bodies may arrive gzip-compressed.
    let push_routes = Router::new()
        .route("/api/v1/push", get(push::push).post(push::push))
        .route("/osmand", get(push::push).post(push::push))
        .layer(DefaultBodyLimit::max(config.push.max_body_size))
        .layer(RequestDecompressionLayer::new());

    let equipment_routes = Router::new()
        .route("/api/v1/equipment", get(equipment::list_equipment))
        .route("/api/v1/equipment/:id", patch(equipment::update_equipment))
        .route(
            "/api/v1/equipment/:id/last.geojson",
            get(equipment::last_position),
        )
        .route("/api/v1/equipment/:id/zones.geojson", get(equipment::zones))
        .route(
            "/api/v1/equipment/:id/analyze",
            post(analysis::analyze_equipment),
        )
        .route("/api/v1/analyze", post(analysis::analyze_all));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(public_routes)
        .merge(push_routes)
        .merge(equipment_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
