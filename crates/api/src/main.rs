use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fieldzone_api::{
    app::{self, AppState},
    config::Config,
    jobs::{JobFrequency, JobScheduler, NightlyAnalysisJob, PoolMetricsJob, PositionRefreshJob},
    middleware,
    services::TraccarClient,
};
use sqlx::PgPool;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load and validate configuration
    let config = Config::load()?;

    // Initialize logging and metrics
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting FieldZone API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    // Run migrations
    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let state = AppState::new(config.clone(), persistence::pg_stores(pool.clone()));

    // At most one process per deployment runs the scheduler.
    let scheduler = if config.scheduler.enabled {
        Some(start_scheduler(&config, &state, pool)?)
    } else {
        info!("Scheduler disabled for this process");
        None
    };

    if config.scheduler.enabled && config.scheduler.run_initial_analysis {
        spawn_initial_analysis(&config, &state);
    }

    // Build application
    let app = app::create_app(state);

    // Start server
    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(30)).await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn start_scheduler(config: &Config, state: &AppState, pool: PgPool) -> Result<JobScheduler> {
    let mut scheduler = JobScheduler::new();

    scheduler.register(NightlyAnalysisJob::new(
        state.analysis.clone(),
        config.analysis.nightly_lookback_days,
        JobFrequency::DailyAt {
            hour: config.scheduler.nightly_hour,
            minute: config.scheduler.nightly_minute,
            utc_offset_minutes: config.analysis.utc_offset_minutes,
        },
    ));

    if config.traccar.enabled() {
        let client = TraccarClient::new(config.traccar.clone())?;
        scheduler.register(PositionRefreshJob::new(
            Arc::new(client),
            state.stores.clone(),
            config.traccar.lookback_hours,
            config.scheduler.refresh_interval_secs,
        ));
    } else {
        warn!("traccar.base_url not set, position refresh disabled");
    }

    scheduler.register(PoolMetricsJob::new(pool, config.database.max_connections));
    scheduler.start();
    Ok(scheduler)
}

/// One sweep at start-up, skipped once any zone exists.
fn spawn_initial_analysis(config: &Config, state: &AppState) {
    let analysis = state.analysis.clone();
    let zones = state.stores.zones.clone();
    let lookback_days = config.analysis.nightly_lookback_days;

    tokio::spawn(async move {
        match zones.count().await {
            Ok(0) => {}
            Ok(count) => {
                info!(zones = count, "Zones already present, skipping initial analysis");
                return;
            }
            Err(e) => {
                error!(error = %e, "Could not count zones, skipping initial analysis");
                return;
            }
        }

        let to = analysis.today();
        let from = to - chrono::Duration::days(lookback_days);
        info!(from = %from, to = %to, "Running initial analysis");
        if let Err(e) = analysis.analyze_all(from, to).await {
            error!(error = %e, "Initial analysis failed");
        }
    });
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
