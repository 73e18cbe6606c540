//! Storage seams.
//!
//! Ingestion and analysis only talk to these traits. PostgreSQL and
//! in-memory implementations live in the persistence crate.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::models::{
    DailyZone, Equipment, EquipmentTotals, InsertOutcome, LastPosition, NewDailyZone,
    NewEquipment, NewPosition, Position,
};

#[async_trait::async_trait]
pub trait EquipmentStore: Send + Sync {
    /// Cheap connectivity check used by readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Equipment>, StoreError>;

    async fn find_by_push_id(&self, push_id: &str) -> Result<Option<Equipment>, StoreError>;

    /// All equipment ordered by id.
    async fn list(&self) -> Result<Vec<Equipment>, StoreError>;

    /// Equipment flagged for the nightly sweep, ordered by id.
    async fn list_included(&self) -> Result<Vec<Equipment>, StoreError>;

    /// Equipment linked to a remote tracking server device.
    async fn list_pull_sourced(&self) -> Result<Vec<Equipment>, StoreError>;

    /// Returns the equipment for `new.push_id`, creating it if absent.
    /// The flag is true when this call created it.
    async fn find_or_create_by_push_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError>;

    /// Same as [`find_or_create_by_push_id`](Self::find_or_create_by_push_id),
    /// keyed on `new.pull_id`.
    async fn find_or_create_by_pull_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError>;

    /// Updates the last-known position cache when `last` is newer than the
    /// cached fix. Returns whether anything changed.
    async fn update_last_position(
        &self,
        id: i64,
        last: &LastPosition,
        battery_level: Option<i32>,
    ) -> Result<bool, StoreError>;

    async fn update_totals(&self, id: i64, totals: &EquipmentTotals) -> Result<(), StoreError>;

    /// Sets the nightly sweep flag. `None` when the equipment does not exist.
    async fn set_included(&self, id: i64, included: bool) -> Result<Option<Equipment>, StoreError>;

    /// Sets or clears the token pushes must present.
    async fn set_push_token(
        &self,
        id: i64,
        token: Option<&str>,
    ) -> Result<Option<Equipment>, StoreError>;
}

#[async_trait::async_trait]
pub trait PositionStore: Send + Sync {
    /// Appends fixes, silently skipping ones already stored for the same
    /// (equipment, timestamp, latitude, longitude).
    async fn insert_many(
        &self,
        equipment_id: i64,
        positions: &[NewPosition],
    ) -> Result<InsertOutcome, StoreError>;

    /// Fixes in the half-open range `[from, to)`, ordered by timestamp then id.
    async fn list_between(
        &self,
        equipment_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, StoreError>;

    async fn latest(&self, equipment_id: i64) -> Result<Option<Position>, StoreError>;
}

#[async_trait::async_trait]
pub trait ZoneStore: Send + Sync {
    /// Atomically replaces every zone of (equipment, date). An empty slice
    /// clears the day.
    async fn replace_day(
        &self,
        equipment_id: i64,
        date: NaiveDate,
        zones: &[NewDailyZone],
    ) -> Result<Vec<DailyZone>, StoreError>;

    /// Zones with `from <= date <= to`, ordered by date then zone index.
    async fn list_between(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyZone>, StoreError>;

    async fn list_for_equipment(&self, equipment_id: i64) -> Result<Vec<DailyZone>, StoreError>;

    /// Number of stored zones across all equipment.
    async fn count(&self) -> Result<i64, StoreError>;
}

/// The three stores bundled for injection into services.
#[derive(Clone)]
pub struct Stores {
    pub equipment: Arc<dyn EquipmentStore>,
    pub positions: Arc<dyn PositionStore>,
    pub zones: Arc<dyn ZoneStore>,
}
