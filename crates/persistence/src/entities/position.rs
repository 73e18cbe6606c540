//! Position entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{Position, PositionSource};
use sqlx::FromRow;

/// Database row mapping for the positions table.
#[derive(Debug, Clone, FromRow)]
pub struct PositionEntity {
    pub id: i64,
    pub equipment_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
    pub speed_kmh: Option<f64>,
    pub battery_level: Option<i32>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PositionEntity> for Position {
    type Error = StoreError;

    fn try_from(entity: PositionEntity) -> Result<Self, Self::Error> {
        let source: PositionSource = entity
            .source
            .parse()
            .map_err(|e: String| StoreError::Corrupt(format!("position {}: {e}", entity.id)))?;

        Ok(Self {
            id: entity.id,
            equipment_id: entity.equipment_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            timestamp: entity.recorded_at,
            speed: entity.speed_kmh,
            battery_level: entity.battery_level,
            source,
            created_at: entity.created_at,
        })
    }
}
