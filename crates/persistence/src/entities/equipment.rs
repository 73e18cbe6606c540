//! Equipment entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Equipment, LastPosition};
use sqlx::FromRow;

/// Database row mapping for the equipment table.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentEntity {
    pub id: i64,
    pub name: String,
    pub pull_id: Option<i64>,
    pub push_id: Option<String>,
    pub included_in_analysis: bool,
    pub push_token: Option<String>,
    pub last_position_at: Option<DateTime<Utc>>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub battery_level: Option<i32>,
    pub total_hectares: f64,
    pub relative_hectares: f64,
    pub distance_between_zones_m: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EquipmentEntity> for Equipment {
    fn from(entity: EquipmentEntity) -> Self {
        let last_position = match (
            entity.last_latitude,
            entity.last_longitude,
            entity.last_position_at,
        ) {
            (Some(latitude), Some(longitude), Some(timestamp)) => Some(LastPosition {
                latitude,
                longitude,
                timestamp,
            }),
            _ => None,
        };

        Self {
            id: entity.id,
            name: entity.name,
            pull_id: entity.pull_id,
            push_id: entity.push_id,
            included_in_analysis: entity.included_in_analysis,
            push_token: entity.push_token,
            last_position,
            battery_level: entity.battery_level,
            total_hectares: entity.total_hectares,
            relative_hectares: entity.relative_hectares,
            distance_between_zones_m: entity.distance_between_zones_m,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
