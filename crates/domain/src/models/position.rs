//! Position domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which ingestion path produced a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSource {
    Pull,
    Push,
}

impl PositionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSource::Pull => "pull",
            PositionSource::Push => "push",
        }
    }
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pull" => Ok(PositionSource::Pull),
            "push" => Ok(PositionSource::Push),
            other => Err(format!("unknown position source: {other}")),
        }
    }
}

/// A stored GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: i64,
    pub equipment_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    /// Ground speed in km/h.
    pub speed: Option<f64>,
    /// Battery level, 0-100.
    pub battery_level: Option<i32>,
    pub source: PositionSource,
    pub created_at: DateTime<Utc>,
}

/// A normalized fix that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub speed: Option<f64>,
    pub battery_level: Option<i32>,
    pub source: PositionSource,
}

impl NewPosition {
    /// Identity used for de-duplication in storage.
    pub fn dedup_key(&self) -> (i64, u64, u64) {
        (
            self.timestamp.timestamp(),
            self.latitude.to_bits(),
            self.longitude.to_bits(),
        )
    }
}

/// Outcome of an append to the position store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

impl std::ops::AddAssign for InsertOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.duplicates += rhs.duplicates;
    }
}
