//! Daily zone domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A closed ring of `[longitude, latitude]` pairs, first point repeated last.
pub type Ring = Vec<[f64; 2]>;

/// Square meters per hectare.
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// How a zone boundary was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneMethod {
    AlphaShape,
    ConvexHull,
    Buffered,
}

impl ZoneMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneMethod::AlphaShape => "alpha_shape",
            ZoneMethod::ConvexHull => "convex_hull",
            ZoneMethod::Buffered => "buffered",
        }
    }
}

impl fmt::Display for ZoneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha_shape" => Ok(ZoneMethod::AlphaShape),
            "convex_hull" => Ok(ZoneMethod::ConvexHull),
            "buffered" => Ok(ZoneMethod::Buffered),
            other => Err(format!("unknown zone method: {other}")),
        }
    }
}

/// A persisted work zone for one equipment on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyZone {
    pub id: i64,
    pub equipment_id: i64,
    pub date: NaiveDate,
    pub zone_index: i32,
    pub area_m2: f64,
    pub area_ha: f64,
    /// Exterior ring followed by holes.
    pub boundary: Vec<Ring>,
    pub point_count: i32,
    pub method: ZoneMethod,
    pub computed_at: DateTime<Utc>,
}

/// A computed zone ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDailyZone {
    pub zone_index: i32,
    pub area_m2: f64,
    pub boundary: Vec<Ring>,
    pub point_count: i32,
    pub method: ZoneMethod,
}

impl NewDailyZone {
    pub fn area_ha(&self) -> f64 {
        self.area_m2 / M2_PER_HECTARE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_method_names() {
        for method in [
            ZoneMethod::AlphaShape,
            ZoneMethod::ConvexHull,
            ZoneMethod::Buffered,
        ] {
            assert_eq!(method.as_str().parse::<ZoneMethod>(), Ok(method));
        }
        assert!("hull".parse::<ZoneMethod>().is_err());
    }

    #[test]
    fn test_area_ha() {
        let zone = NewDailyZone {
            zone_index: 0,
            area_m2: 12_500.0,
            boundary: vec![],
            point_count: 10,
            method: ZoneMethod::AlphaShape,
        };
        assert!((zone.area_ha() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&ZoneMethod::ConvexHull).unwrap();
        assert_eq!(json, "\"convex_hull\"");
    }
}
