//! Daily zone entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::error::StoreError;
use domain::models::{DailyZone, Ring, ZoneMethod};
use serde_json::{json, Value};
use sqlx::FromRow;

/// Database row mapping for the daily_zones table.
#[derive(Debug, Clone, FromRow)]
pub struct DailyZoneEntity {
    pub id: i64,
    pub equipment_id: i64,
    pub zone_date: NaiveDate,
    pub zone_index: i32,
    pub area_m2: f64,
    pub area_ha: f64,
    /// GeoJSON Polygon geometry.
    pub boundary: Value,
    pub point_count: i32,
    pub method: String,
    pub computed_at: DateTime<Utc>,
}

/// Encodes rings as a GeoJSON Polygon geometry.
pub fn boundary_to_geometry(boundary: &[Ring]) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": boundary,
    })
}

/// Decodes a GeoJSON Polygon geometry into rings.
pub fn geometry_to_boundary(geometry: &Value) -> Result<Vec<Ring>, String> {
    match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => {}
        other => return Err(format!("expected Polygon geometry, got {other:?}")),
    }
    let coordinates = geometry
        .get("coordinates")
        .cloned()
        .ok_or_else(|| "geometry has no coordinates".to_string())?;
    serde_json::from_value(coordinates).map_err(|e| e.to_string())
}

impl TryFrom<DailyZoneEntity> for DailyZone {
    type Error = StoreError;

    fn try_from(entity: DailyZoneEntity) -> Result<Self, Self::Error> {
        let corrupt = |e: String| StoreError::Corrupt(format!("daily zone {}: {e}", entity.id));
        let boundary = geometry_to_boundary(&entity.boundary).map_err(corrupt)?;
        let method: ZoneMethod = entity.method.parse().map_err(corrupt)?;

        Ok(Self {
            id: entity.id,
            equipment_id: entity.equipment_id,
            date: entity.zone_date,
            zone_index: entity.zone_index,
            area_m2: entity.area_m2,
            area_ha: entity.area_ha,
            boundary,
            point_count: entity.point_count,
            method,
            computed_at: entity.computed_at,
        })
    }
}
