//! Equipment status and GeoJSON export handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{DailyZone, Equipment, LastPosition};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// Width of the `push_token` column.
const MAX_PUSH_TOKEN_LEN: usize = 255;

/// One row of the equipment status list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentStatus {
    pub id: i64,
    pub name: String,
    /// `pull` for remote-server devices, `push` for self-reporting ones.
    pub source: &'static str,
    pub included_in_analysis: bool,
    pub token_required: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_position: Option<LastPosition>,
    pub battery_level: Option<i32>,
    pub total_hectares: f64,
    pub relative_hectares: f64,
    pub distance_between_zones_m: f64,
}

impl From<Equipment> for EquipmentStatus {
    fn from(equipment: Equipment) -> Self {
        let token_required = equipment.requires_token();
        Self {
            id: equipment.id,
            source: if equipment.pull_id.is_some() { "pull" } else { "push" },
            name: equipment.name,
            included_in_analysis: equipment.included_in_analysis,
            token_required,
            last_seen: equipment.last_position.map(|p| p.timestamp),
            last_position: equipment.last_position,
            battery_level: equipment.battery_level,
            total_hectares: equipment.total_hectares,
            relative_hectares: equipment.relative_hectares,
            distance_between_zones_m: equipment.distance_between_zones_m,
        }
    }
}

/// Partial update of an equipment. An empty `push_token` clears it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEquipmentRequest {
    pub included_in_analysis: Option<bool>,
    pub push_token: Option<String>,
}

impl UpdateEquipmentRequest {
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let update: Self = serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("invalid equipment update: {e}")))?;
        if update.included_in_analysis.is_none() && update.push_token.is_none() {
            return Err(ApiError::Validation("nothing to update".to_string()));
        }
        if update
            .push_token
            .as_deref()
            .is_some_and(|t| t.trim().len() > MAX_PUSH_TOKEN_LEN)
        {
            return Err(ApiError::Validation(format!(
                "push_token exceeds {MAX_PUSH_TOKEN_LEN} characters"
            )));
        }
        Ok(update)
    }
}

#[derive(Debug, Deserialize)]
pub struct ZoneRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// List all equipment.
///
/// GET /api/v1/equipment
pub async fn list_equipment(
    State(state): State<AppState>,
) -> Result<Json<Vec<EquipmentStatus>>, ApiError> {
    let equipment = state.stores.equipment.list().await?;
    Ok(Json(equipment.into_iter().map(EquipmentStatus::from).collect()))
}

/// Toggle analysis inclusion or change the ingestion token.
///
/// PATCH /api/v1/equipment/:id
pub async fn update_equipment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<EquipmentStatus>, ApiError> {
    let update = UpdateEquipmentRequest::parse(&body)?;
    let mut equipment = find_equipment(&state, id).await?;

    if let Some(included) = update.included_in_analysis {
        equipment = state
            .stores
            .equipment
            .set_included(id, included)
            .await?
            .ok_or_else(|| not_found(id))?;
    }
    if let Some(token) = update.push_token.as_deref().map(str::trim) {
        let token = (!token.is_empty()).then_some(token);
        equipment = state
            .stores
            .equipment
            .set_push_token(id, token)
            .await?
            .ok_or_else(|| not_found(id))?;
    }

    info!(
        equipment_id = id,
        included = equipment.included_in_analysis,
        token = ?equipment.push_token.as_deref().map(shared::crypto::token_fingerprint),
        "Equipment updated"
    );
    Ok(Json(equipment.into()))
}

/// Last known position as a one-feature collection.
///
/// GET /api/v1/equipment/:id/last.geojson
pub async fn last_position(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let equipment = find_equipment(&state, id).await?;
    let features = equipment
        .last_position
        .map(|last| point_feature(&equipment, &last))
        .into_iter()
        .collect();
    geojson_response(features)
}

/// Zones as polygon features.
///
/// GET /api/v1/equipment/:id/zones.geojson?from=YYYY-MM-DD&to=YYYY-MM-DD
///
/// Without a range every stored zone is returned. A lone `from` runs to
/// today; a lone `to` selects that single day.
pub async fn zones(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(range): Query<ZoneRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    find_equipment(&state, id).await?;

    let zones = match (range.from, range.to) {
        (None, None) => state.stores.zones.list_for_equipment(id).await?,
        (from, to) => {
            let to = to.unwrap_or_else(|| state.analysis.today());
            let from = from.unwrap_or(to);
            if from > to {
                return Err(ApiError::Validation(format!("{from} is after {to}")));
            }
            state.stores.zones.list_between(id, from, to).await?
        }
    };

    geojson_response(zones.iter().map(zone_feature).collect())
}

async fn find_equipment(state: &AppState, id: i64) -> Result<Equipment, ApiError> {
    state
        .stores
        .equipment
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Equipment {id} not found"))
}

fn point_feature(equipment: &Equipment, last: &LastPosition) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("equipment_id".into(), json!(equipment.id));
    properties.insert("name".into(), json!(equipment.name));
    properties.insert("timestamp".into(), json!(last.timestamp.to_rfc3339()));
    properties.insert("battery_level".into(), json!(equipment.battery_level));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::Point(vec![
            last.longitude,
            last.latitude,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn zone_feature(zone: &DailyZone) -> Feature {
    let rings = zone
        .boundary
        .iter()
        .map(|ring| ring.iter().map(|coord| coord.to_vec()).collect())
        .collect();

    let mut properties = JsonObject::new();
    properties.insert("equipment_id".into(), json!(zone.equipment_id));
    properties.insert("date".into(), json!(zone.date.to_string()));
    properties.insert("zone_index".into(), json!(zone.zone_index));
    properties.insert("area".into(), json!(zone.area_m2));
    properties.insert("area_ha".into(), json!(zone.area_ha));
    properties.insert("point_count".into(), json!(zone.point_count));
    properties.insert("method".into(), json!(zone.method.as_str()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::Polygon(rings))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn geojson_response(features: Vec<Feature>) -> Result<impl IntoResponse, ApiError> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let body = serde_json::to_string(&collection)
        .map_err(|e| ApiError::Internal(format!("GeoJSON encoding failed: {e}")))?;
    Ok(([(header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE)], body))
}
