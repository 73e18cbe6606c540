//! Position repository for database operations.

use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{InsertOutcome, NewPosition, Position};
use domain::services::PositionStore;
use sqlx::PgPool;

use super::db_error;
use crate::entities::PositionEntity;
use crate::metrics::QueryTimer;

/// Repository for position-related database operations.
#[derive(Clone)]
pub struct PositionRepository {
    pool: PgPool,
}

impl PositionRepository {
    /// Creates a new PositionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PositionStore for PositionRepository {
    /// Inserts every fix inside one transaction. Duplicates hit the
    /// `uq_positions_fix` constraint and are counted instead of failing.
    async fn insert_many(
        &self,
        equipment_id: i64,
        positions: &[NewPosition],
    ) -> Result<InsertOutcome, StoreError> {
        let timer = QueryTimer::new("insert_positions_batch");
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut outcome = InsertOutcome::default();

        for position in positions {
            let result = sqlx::query(
                r#"
                INSERT INTO positions (
                    equipment_id, latitude, longitude, recorded_at,
                    speed_kmh, battery_level, source
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (equipment_id, recorded_at, latitude, longitude) DO NOTHING
                "#,
            )
            .bind(equipment_id)
            .bind(position.latitude)
            .bind(position.longitude)
            .bind(position.timestamp)
            .bind(position.speed)
            .bind(position.battery_level)
            .bind(position.source.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if result.rows_affected() > 0 {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        tx.commit().await.map_err(db_error)?;
        timer.record();
        Ok(outcome)
    }

    async fn list_between(
        &self,
        equipment_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, StoreError> {
        let timer = QueryTimer::new("list_positions_between");
        let result = sqlx::query_as::<_, PositionEntity>(
            r#"
            SELECT id, equipment_id, latitude, longitude, recorded_at,
                   speed_kmh, battery_level, source, created_at
            FROM positions
            WHERE equipment_id = $1
              AND recorded_at >= $2
              AND recorded_at < $3
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(equipment_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await;
        timer.record_result(&result);

        result
            .map_err(db_error)?
            .into_iter()
            .map(Position::try_from)
            .collect()
    }

    async fn latest(&self, equipment_id: i64) -> Result<Option<Position>, StoreError> {
        let timer = QueryTimer::new("latest_position");
        let result = sqlx::query_as::<_, PositionEntity>(
            r#"
            SELECT id, equipment_id, latitude, longitude, recorded_at,
                   speed_kmh, battery_level, source, created_at
            FROM positions
            WHERE equipment_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(equipment_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record_result(&result);

        result.map_err(db_error)?.map(Position::try_from).transpose()
    }
}
