//! In-memory store.
//!
//! Implements every store trait behind one `RwLock`, with the same ordering,
//! de-duplication and replace semantics as the PostgreSQL repositories. Used
//! by tests and for running without a database.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use domain::error::StoreError;
use domain::models::{
    DailyZone, Equipment, EquipmentTotals, InsertOutcome, LastPosition, NewDailyZone,
    NewEquipment, NewPosition, Position,
};
use domain::services::{EquipmentStore, PositionStore, Stores, ZoneStore};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    equipment: BTreeMap<i64, Equipment>,
    positions: Vec<Position>,
    position_keys: HashSet<(i64, i64, u64, u64)>,
    zones: Vec<DailyZone>,
    next_id: i64,
    offline: bool,
    failing_dates: HashSet<NaiveDate>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Database("store is offline".to_string()));
        }
        Ok(())
    }

    fn create_equipment(&mut self, new: &NewEquipment) -> Equipment {
        let now = Utc::now();
        let equipment = Equipment {
            id: self.next_id(),
            name: new.name.clone(),
            pull_id: new.pull_id,
            push_id: new.push_id.clone(),
            included_in_analysis: new.included_in_analysis,
            push_token: new.push_token.clone(),
            last_position: None,
            battery_level: None,
            total_hectares: 0.0,
            relative_hectares: 0.0,
            distance_between_zones_m: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.equipment.insert(equipment.id, equipment.clone());
        equipment
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three store handles, all backed by this instance.
    pub fn stores(&self) -> Stores {
        Stores {
            equipment: Arc::new(self.clone()),
            positions: Arc::new(self.clone()),
            zones: Arc::new(self.clone()),
        }
    }

    /// Makes every operation fail with a database error until reset.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Makes zone replacement fail for `date`.
    pub async fn fail_zone_writes_on(&self, date: NaiveDate) {
        self.state.write().await.failing_dates.insert(date);
    }

    async fn modify_equipment(
        &self,
        id: i64,
        change: impl FnOnce(&mut Equipment) + Send,
    ) -> Result<Option<Equipment>, StoreError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        Ok(state.equipment.get_mut(&id).map(|equipment| {
            change(equipment);
            equipment.updated_at = Utc::now();
            equipment.clone()
        }))
    }
}

#[async_trait::async_trait]
impl EquipmentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.state.read().await.check_online()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Equipment>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.equipment.get(&id).cloned())
    }

    async fn find_by_push_id(&self, push_id: &str) -> Result<Option<Equipment>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .equipment
            .values()
            .find(|e| e.push_id.as_deref() == Some(push_id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Equipment>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.equipment.values().cloned().collect())
    }

    async fn list_included(&self) -> Result<Vec<Equipment>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .equipment
            .values()
            .filter(|e| e.included_in_analysis)
            .cloned()
            .collect())
    }

    async fn list_pull_sourced(&self) -> Result<Vec<Equipment>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .equipment
            .values()
            .filter(|e| e.pull_id.is_some())
            .cloned()
            .collect())
    }

    async fn find_or_create_by_push_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError> {
        let push_id = new
            .push_id
            .as_deref()
            .ok_or_else(|| StoreError::Database("push_id is required".to_string()))?;
        let mut state = self.state.write().await;
        state.check_online()?;
        if let Some(existing) = state
            .equipment
            .values()
            .find(|e| e.push_id.as_deref() == Some(push_id))
        {
            return Ok((existing.clone(), false));
        }
        Ok((state.create_equipment(new), true))
    }

    async fn find_or_create_by_pull_id(
        &self,
        new: &NewEquipment,
    ) -> Result<(Equipment, bool), StoreError> {
        let pull_id = new
            .pull_id
            .ok_or_else(|| StoreError::Database("pull_id is required".to_string()))?;
        let mut state = self.state.write().await;
        state.check_online()?;
        if let Some(existing) = state
            .equipment
            .values()
            .find(|e| e.pull_id == Some(pull_id))
        {
            return Ok((existing.clone(), false));
        }
        Ok((state.create_equipment(new), true))
    }

    async fn update_last_position(
        &self,
        id: i64,
        last: &LastPosition,
        battery_level: Option<i32>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let equipment = state
            .equipment
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("equipment {id}")))?;

        let newer = equipment
            .last_position
            .map_or(true, |current| current.timestamp < last.timestamp);
        if !newer {
            return Ok(false);
        }
        equipment.last_position = Some(*last);
        if battery_level.is_some() {
            equipment.battery_level = battery_level;
        }
        equipment.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_totals(&self, id: i64, totals: &EquipmentTotals) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        let equipment = state
            .equipment
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("equipment {id}")))?;
        equipment.total_hectares = totals.total_hectares;
        equipment.relative_hectares = totals.relative_hectares;
        equipment.distance_between_zones_m = totals.distance_between_zones_m;
        equipment.updated_at = Utc::now();
        Ok(())
    }

    async fn set_included(&self, id: i64, included: bool) -> Result<Option<Equipment>, StoreError> {
        self.modify_equipment(id, |e| e.included_in_analysis = included).await
    }

    async fn set_push_token(
        &self,
        id: i64,
        token: Option<&str>,
    ) -> Result<Option<Equipment>, StoreError> {
        self.modify_equipment(id, |e| e.push_token = token.map(str::to_string))
            .await
    }
}

#[async_trait::async_trait]
impl PositionStore for MemoryStore {
    async fn insert_many(
        &self,
        equipment_id: i64,
        positions: &[NewPosition],
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if !state.equipment.contains_key(&equipment_id) {
            return Err(StoreError::NotFound(format!("equipment {equipment_id}")));
        }

        let mut outcome = InsertOutcome::default();
        for new in positions {
            let (ts, lat, lon) = new.dedup_key();
            if !state.position_keys.insert((equipment_id, ts, lat, lon)) {
                outcome.duplicates += 1;
                continue;
            }
            let position = Position {
                id: state.next_id(),
                equipment_id,
                latitude: new.latitude,
                longitude: new.longitude,
                timestamp: new.timestamp,
                speed: new.speed,
                battery_level: new.battery_level,
                source: new.source,
                created_at: Utc::now(),
            };
            state.positions.push(position);
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn list_between(
        &self,
        equipment_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        let mut found: Vec<Position> = state
            .positions
            .iter()
            .filter(|p| p.equipment_id == equipment_id && p.timestamp >= from && p.timestamp < to)
            .cloned()
            .collect();
        found.sort_by_key(|p| (p.timestamp, p.id));
        Ok(found)
    }

    async fn latest(&self, equipment_id: i64) -> Result<Option<Position>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state
            .positions
            .iter()
            .filter(|p| p.equipment_id == equipment_id)
            .max_by_key(|p| (p.timestamp, p.id))
            .cloned())
    }
}

#[async_trait::async_trait]
impl ZoneStore for MemoryStore {
    async fn replace_day(
        &self,
        equipment_id: i64,
        date: NaiveDate,
        zones: &[NewDailyZone],
    ) -> Result<Vec<DailyZone>, StoreError> {
        let mut state = self.state.write().await;
        state.check_online()?;
        if state.failing_dates.contains(&date) {
            return Err(StoreError::Database(format!("injected failure for {date}")));
        }

        state
            .zones
            .retain(|z| !(z.equipment_id == equipment_id && z.date == date));

        let computed_at = Utc::now();
        let mut stored = Vec::with_capacity(zones.len());
        for zone in zones {
            let row = DailyZone {
                id: state.next_id(),
                equipment_id,
                date,
                zone_index: zone.zone_index,
                area_m2: zone.area_m2,
                area_ha: zone.area_ha(),
                boundary: zone.boundary.clone(),
                point_count: zone.point_count,
                method: zone.method,
                computed_at,
            };
            state.zones.push(row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    async fn list_between(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyZone>, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        let mut found: Vec<DailyZone> = state
            .zones
            .iter()
            .filter(|z| z.equipment_id == equipment_id && z.date >= from && z.date <= to)
            .cloned()
            .collect();
        found.sort_by_key(|z| (z.date, z.zone_index));
        Ok(found)
    }

    async fn list_for_equipment(&self, equipment_id: i64) -> Result<Vec<DailyZone>, StoreError> {
        ZoneStore::list_between(self, equipment_id, NaiveDate::MIN, NaiveDate::MAX).await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        state.check_online()?;
        Ok(state.zones.len() as i64)
    }
}
