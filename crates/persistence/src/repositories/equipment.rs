//! Equipment repository for database operations.

use domain::error::StoreError;
use domain::models::{Equipment, EquipmentTotals, LastPosition, NewEquipment};
use domain::services::EquipmentStore;
use sqlx::PgPool;

use super::db_error;
use crate::entities::EquipmentEntity;
use crate::metrics::QueryTimer;

/// Repository for equipment-related database operations.
#[derive(Clone)]
pub struct EquipmentRepository {
    pool: PgPool,
}

impl EquipmentRepository {
    /// Creates a new EquipmentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        query_name: &str,
        sql: &str,
        value: &str,
    ) -> Result<Option<Equipment>, StoreError> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query_as::<_, EquipmentEntity>(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await;
        timer.record_result(&result);
        Ok(result.map_err(db_error)?.map(Equipment::from))
    }

    async fn fetch_all(&self, query_name: &str, sql: &str) -> Result<Vec<Equipment>, StoreError> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query_as::<_, EquipmentEntity>(sql)
            .fetch_all(&self.pool)
            .await;
        timer.record_result(&result);
        Ok(result
            .map_err(db_error)?
            .into_iter()
            .map(Equipment::from)
            .collect())
    }
}

#[async_trait::async_trait]
impl EquipmentStore for EquipmentRepository {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Equipment>, StoreError> {
        let timer = QueryTimer::new("find_equipment_by_id");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record_result(&result);
        Ok(result.map_err(db_error)?.map(Equipment::from))
    }

    async fn find_by_push_id(&self, push_id: &str) -> Result<Option<Equipment>, StoreError> {
        self.fetch_one_where(
            "find_equipment_by_push_id",
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            WHERE push_id = $1
            "#,
            push_id,
        )
        .await
    }

    async fn list(&self) -> Result<Vec<Equipment>, StoreError> {
        self.fetch_all(
            "list_equipment",
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            ORDER BY id ASC
            "#,
        )
        .await
    }

    async fn list_included(&self) -> Result<Vec<Equipment>, StoreError> {
        self.fetch_all(
            "list_included_equipment",
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            WHERE included_in_analysis = true
            ORDER BY id ASC
            "#,
        )
        .await
    }

    async fn list_pull_sourced(&self) -> Result<Vec<Equipment>, StoreError> {
        self.fetch_all(
            "list_pull_sourced_equipment",
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            WHERE pull_id IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .await
    }

    async fn find_or_create_by_push_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError> {
        let push_id = new
            .push_id
            .as_deref()
            .ok_or_else(|| StoreError::Database("push_id is required".to_string()))?;
        let timer = QueryTimer::new("create_equipment_by_push_id");

        // INSERT ... ON CONFLICT DO NOTHING, then fetch whichever row won.
        let insert_result = sqlx::query(
            r#"
            INSERT INTO equipment (name, pull_id, push_id, included_in_analysis, push_token)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (push_id) WHERE push_id IS NOT NULL DO NOTHING
            "#,
        )
        .bind(&new.name)
        .bind(new.pull_id)
        .bind(push_id)
        .bind(new.included_in_analysis)
        .bind(&new.push_token)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let created = insert_result.rows_affected() > 0;
        let equipment = self
            .find_by_push_id(push_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("equipment with push id {push_id}")))?;

        timer.record();
        Ok((equipment, created))
    }

    async fn find_or_create_by_pull_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError> {
        let pull_id = new
            .pull_id
            .ok_or_else(|| StoreError::Database("pull_id is required".to_string()))?;
        let timer = QueryTimer::new("create_equipment_by_pull_id");

        let insert_result = sqlx::query(
            r#"
            INSERT INTO equipment (name, pull_id, push_id, included_in_analysis, push_token)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (pull_id) WHERE pull_id IS NOT NULL DO NOTHING
            "#,
        )
        .bind(&new.name)
        .bind(pull_id)
        .bind(&new.push_id)
        .bind(new.included_in_analysis)
        .bind(&new.push_token)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let created = insert_result.rows_affected() > 0;
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            SELECT id, name, pull_id, push_id, included_in_analysis, push_token,
                   last_position_at, last_latitude, last_longitude, battery_level,
                   total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            FROM equipment
            WHERE pull_id = $1
            "#,
        )
        .bind(pull_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        timer.record();
        let entity =
            result.ok_or_else(|| StoreError::NotFound(format!("equipment with pull id {pull_id}")))?;
        Ok((entity.into(), created))
    }

    async fn update_last_position(
        &self,
        id: i64,
        last: &LastPosition,
        battery_level: Option<i32>,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("update_equipment_last_position");
        let result = sqlx::query(
            r#"
            UPDATE equipment
            SET last_position_at = $2,
                last_latitude = $3,
                last_longitude = $4,
                battery_level = COALESCE($5, battery_level),
                updated_at = NOW()
            WHERE id = $1
              AND (last_position_at IS NULL OR last_position_at < $2)
            "#,
        )
        .bind(id)
        .bind(last.timestamp)
        .bind(last.latitude)
        .bind(last.longitude)
        .bind(battery_level)
        .execute(&self.pool)
        .await;
        timer.record_result(&result);
        Ok(result.map_err(db_error)?.rows_affected() > 0)
    }

    async fn update_totals(&self, id: i64, totals: &EquipmentTotals) -> Result<(), StoreError> {
        let timer = QueryTimer::new("update_equipment_totals");
        let result = sqlx::query(
            r#"
            UPDATE equipment
            SET total_hectares = $2,
                relative_hectares = $3,
                distance_between_zones_m = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(totals.total_hectares)
        .bind(totals.relative_hectares)
        .bind(totals.distance_between_zones_m)
        .execute(&self.pool)
        .await;
        timer.record_result(&result);

        if result.map_err(db_error)?.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("equipment {id}")));
        }
        Ok(())
    }

    async fn set_included(&self, id: i64, included: bool) -> Result<Option<Equipment>, StoreError> {
        let timer = QueryTimer::new("set_equipment_included");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET included_in_analysis = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, pull_id, push_id, included_in_analysis, push_token,
                      last_position_at, last_latitude, last_longitude, battery_level,
                      total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(included)
        .fetch_optional(&self.pool)
        .await;
        timer.record_result(&result);
        Ok(result.map_err(db_error)?.map(Equipment::from))
    }

    async fn set_push_token(
        &self,
        id: i64,
        token: Option<&str>,
    ) -> Result<Option<Equipment>, StoreError> {
        let timer = QueryTimer::new("set_equipment_push_token");
        let result = sqlx::query_as::<_, EquipmentEntity>(
            r#"
            UPDATE equipment
            SET push_token = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, pull_id, push_id, included_in_analysis, push_token,
                      last_position_at, last_latitude, last_longitude, battery_level,
                      total_hectares, relative_hectares, distance_between_zones_m, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await;
        timer.record_result(&result);
        Ok(result.map_err(db_error)?.map(Equipment::from))
    }
}
