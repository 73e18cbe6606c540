//! Database metrics collection.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record database query duration.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Count a failed store operation.
pub fn record_query_error(query_name: &str) {
    counter!(
        "database_query_errors_total",
        "query" => query_name.to_string()
    )
    .increment(1);
}

/// Record database connection pool metrics.
///
/// Called periodically by the pool metrics job.
pub fn record_pool_metrics(pool: &PgPool, max_connections: u32) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("fieldzone_db_connections_active").set(active as f64);
    gauge!("fieldzone_db_connections_idle").set(idle as f64);
    gauge!("fieldzone_db_connections_total").set(size as f64);
    gauge!("fieldzone_db_pool_saturation").set(pool_saturation(active, max_connections));
}

/// Share of the configured pool in use, in `[0, 1]`.
fn pool_saturation(active: usize, max_connections: u32) -> f64 {
    if max_connections == 0 {
        return 0.0;
    }
    (active as f64 / f64::from(max_connections)).min(1.0)
}

/// Times a store operation.
///
/// ```ignore
/// let timer = QueryTimer::new("list_positions_between");
/// let result = sqlx::query_as::<_, PositionEntity>(...).fetch_all(&pool).await;
/// timer.record();
/// ```
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_query_duration(&self.query_name, duration);
    }

    /// Record the elapsed duration, and count the error when `result` failed.
    pub fn record_result<T, E>(self, result: &Result<T, E>) {
        if result.is_err() {
            record_query_error(&self.query_name);
        }
        self.record();
    }
}
