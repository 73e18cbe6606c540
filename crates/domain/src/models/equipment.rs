//! Equipment domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked asset.
///
/// `pull_id` is the remote tracking server's device id; equipment created by
/// the push endpoint has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: i64,
    pub name: String,
    pub pull_id: Option<i64>,
    pub push_id: Option<String>,
    pub included_in_analysis: bool,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
    pub last_position: Option<LastPosition>,
    pub battery_level: Option<i32>,
    pub total_hectares: f64,
    /// Ground covered at least once, revisits counted once.
    pub relative_hectares: f64,
    pub distance_between_zones_m: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Whether ingestion for this equipment must present a token.
    pub fn requires_token(&self) -> bool {
        self.push_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

/// Denormalized cache of the most recent fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Input for creating equipment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEquipment {
    pub name: String,
    pub pull_id: Option<i64>,
    pub push_id: Option<String>,
    pub included_in_analysis: bool,
    pub push_token: Option<String>,
}

impl NewEquipment {
    /// Equipment first seen on the push endpoint.
    pub fn from_push(push_id: &str, included_in_analysis: bool, push_token: Option<String>) -> Self {
        Self {
            name: push_id.to_string(),
            pull_id: None,
            push_id: Some(push_id.to_string()),
            included_in_analysis,
            push_token,
        }
    }

    /// Equipment discovered on the remote tracking server.
    pub fn from_pull(pull_id: i64, name: &str) -> Self {
        Self {
            name: name.to_string(),
            pull_id: Some(pull_id),
            push_id: None,
            included_in_analysis: true,
            push_token: None,
        }
    }
}

/// Aggregates recomputed after each analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentTotals {
    /// Sum of each day's merged surface.
    pub total_hectares: f64,
    /// Surface of every day merged together.
    pub relative_hectares: f64,
    pub distance_between_zones_m: f64,
}
