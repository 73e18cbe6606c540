//! Daily zone repository for database operations.

use chrono::NaiveDate;
use domain::error::StoreError;
use domain::models::{DailyZone, NewDailyZone};
use domain::services::ZoneStore;
use sqlx::PgPool;
use tracing::debug;

use super::db_error;
use crate::entities::{boundary_to_geometry, DailyZoneEntity};
use crate::metrics::QueryTimer;

/// Repository for daily zone database operations.
#[derive(Clone)]
pub struct ZoneRepository {
    pool: PgPool,
}

impl ZoneRepository {
    /// Creates a new ZoneRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ZoneStore for ZoneRepository {
    async fn replace_day(
        &self,
        equipment_id: i64,
        date: NaiveDate,
        zones: &[NewDailyZone],
    ) -> Result<Vec<DailyZone>, StoreError> {
        let timer = QueryTimer::new("replace_daily_zones");
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            DELETE FROM daily_zones
            WHERE equipment_id = $1 AND zone_date = $2
            "#,
        )
        .bind(equipment_id)
        .bind(date)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let mut stored = Vec::with_capacity(zones.len());
        for zone in zones {
            let entity = sqlx::query_as::<_, DailyZoneEntity>(
                r#"
                INSERT INTO daily_zones (
                    equipment_id, zone_date, zone_index, area_m2, area_ha,
                    boundary, point_count, method
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, equipment_id, zone_date, zone_index, area_m2, area_ha,
                          boundary, point_count, method, computed_at
                "#,
            )
            .bind(equipment_id)
            .bind(date)
            .bind(zone.zone_index)
            .bind(zone.area_m2)
            .bind(zone.area_ha())
            .bind(boundary_to_geometry(&zone.boundary))
            .bind(zone.point_count)
            .bind(zone.method.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;
            stored.push(DailyZone::try_from(entity)?);
        }

        tx.commit().await.map_err(db_error)?;
        timer.record();
        debug!(equipment_id, date = %date, zones = stored.len(), "Replaced daily zones");
        Ok(stored)
    }

    async fn list_between(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyZone>, StoreError> {
        let timer = QueryTimer::new("list_daily_zones_between");
        let result = sqlx::query_as::<_, DailyZoneEntity>(
            r#"
            SELECT id, equipment_id, zone_date, zone_index, area_m2, area_ha,
                   boundary, point_count, method, computed_at
            FROM daily_zones
            WHERE equipment_id = $1
              AND zone_date BETWEEN $2 AND $3
            ORDER BY zone_date ASC, zone_index ASC
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
            .map(DailyZone::try_from)
            .collect()
    }

    async fn list_for_equipment(&self, equipment_id: i64) -> Result<Vec<DailyZone>, StoreError> {
        let timer = QueryTimer::new("list_daily_zones_for_equipment");
        let result = sqlx::query_as::<_, DailyZoneEntity>(
            r#"
            SELECT id, equipment_id, zone_date, zone_index, area_m2, area_ha,
                   boundary, point_count, method, computed_at
            FROM daily_zones
            WHERE equipment_id = $1
            ORDER BY zone_date ASC, zone_index ASC
            "#,
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await;
        timer.record_result(&result);

        result
            .map_err(db_error)?
            .into_iter()
            .map(DailyZone::try_from)
            .collect()
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) as count
            FROM daily_zones
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(count.0)
    }
}
