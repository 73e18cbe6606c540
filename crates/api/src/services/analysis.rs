//! Zone analysis orchestration.
//!
//! Loads an equipment's positions for a date range, computes the zones of
//! every day and replaces what was stored. Runs for one equipment never
//! overlap: manual requests fail fast on a busy equipment, sweeps queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use dashmap::DashMap;
use domain::error::CoreError;
use domain::models::{Equipment, NewDailyZone};
use domain::services::{
    analyze_day, dates_between, totals, window, AnalysisParams, DayBoundary, Stores,
};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::AnalysisConfig;
use crate::middleware::metrics::{
    record_analysis_duration, record_analysis_failure, record_zones_computed,
};

/// Longest range accepted in one request.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Outcome of analyzing one equipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub equipment_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days_analyzed: usize,
    pub zones: usize,
    pub failed_days: Vec<NaiveDate>,
    pub total_hectares: f64,
    pub relative_hectares: f64,
    pub distance_between_zones_m: f64,
}

/// Outcome of a sweep over all included equipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub equipment: usize,
    pub zones: usize,
    pub failed_days: usize,
    pub failed_equipment: Vec<i64>,
}

#[derive(Clone)]
pub struct AnalysisService {
    stores: Stores,
    params: Arc<AnalysisParams>,
    boundary: DayBoundary,
    min_day_points: usize,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl AnalysisService {
    pub fn new(stores: Stores, config: &AnalysisConfig) -> Self {
        Self {
            stores,
            params: Arc::new(config.to_params()),
            boundary: config.day_boundary(),
            min_day_points: config.min_day_points,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Today's date in the configured local calendar.
    pub fn today(&self) -> NaiveDate {
        self.boundary.today()
    }

    /// Manual analysis of one equipment, regardless of its inclusion flag.
    ///
    /// Fails with `ConcurrentAnalysisConflict` when a run for the same
    /// equipment is in progress.
    pub async fn analyze_one(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AnalysisReport, CoreError> {
        validate_range(from, to)?;
        let equipment = self.load(equipment_id).await?;
        let _guard = self
            .lock_for(equipment_id)
            .try_lock_owned()
            .map_err(|_| CoreError::ConcurrentAnalysisConflict(equipment_id))?;
        self.run(&equipment, from, to).await
    }

    /// Analysis of one equipment that waits for any run in progress.
    pub async fn analyze_range(
        &self,
        equipment_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AnalysisReport, CoreError> {
        validate_range(from, to)?;
        let equipment = self.load(equipment_id).await?;
        let _guard: OwnedMutexGuard<()> = self.lock_for(equipment_id).lock_owned().await;
        self.run(&equipment, from, to).await
    }

    /// Analyzes every included equipment, one task each.
    ///
    /// A failing equipment is logged and listed in the report; the others
    /// still complete.
    pub async fn analyze_all(&self, from: NaiveDate, to: NaiveDate) -> Result<SweepReport, CoreError> {
        validate_range(from, to)?;
        let included = self.stores.equipment.list_included().await?;
        info!(
            equipment = included.len(),
            from = %from,
            to = %to,
            "Starting analysis sweep"
        );

        let handles: Vec<_> = included
            .into_iter()
            .map(|equipment| {
                let service = self.clone();
                let id = equipment.id;
                (
                    id,
                    tokio::spawn(async move { service.analyze_range(id, from, to).await }),
                )
            })
            .collect();

        let mut report = SweepReport::default();
        for (id, handle) in handles {
            report.equipment += 1;
            match handle.await {
                Ok(Ok(run)) => {
                    report.zones += run.zones;
                    report.failed_days += run.failed_days.len();
                }
                Ok(Err(e)) => {
                    record_analysis_failure("equipment");
                    error!(equipment_id = id, error = %e, "Equipment analysis failed");
                    report.failed_equipment.push(id);
                }
                Err(e) => {
                    record_analysis_failure("equipment");
                    error!(equipment_id = id, error = %e, "Equipment analysis task panicked");
                    report.failed_equipment.push(id);
                }
            }
        }

        info!(
            equipment = report.equipment,
            zones = report.zones,
            failed_equipment = report.failed_equipment.len(),
            "Analysis sweep finished"
        );
        Ok(report)
    }

    fn lock_for(&self, equipment_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(equipment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, equipment_id: i64) -> Result<Equipment, CoreError> {
        self.stores
            .equipment
            .find_by_id(equipment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("equipment {equipment_id}")))
    }

    /// Caller holds the equipment lock.
    async fn run(
        &self,
        equipment: &Equipment,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AnalysisReport, CoreError> {
        let started = Instant::now();
        let (start, _) = self.boundary.utc_range(from);
        let (_, end) = self.boundary.utc_range(to);

        let positions = self
            .stores
            .positions
            .list_between(equipment.id, start, end)
            .await?;
        let mut days: HashMap<NaiveDate, _> = window(&positions, &self.boundary, self.min_day_points)
            .into_iter()
            .map(|w| (w.date, w.positions))
            .collect();

        let mut report = AnalysisReport {
            equipment_id: equipment.id,
            from,
            to,
            days_analyzed: 0,
            zones: 0,
            failed_days: Vec::new(),
            total_hectares: equipment.total_hectares,
            relative_hectares: equipment.relative_hectares,
            distance_between_zones_m: equipment.distance_between_zones_m,
        };

        for date in dates_between(from, to) {
            // Sparse days still get an empty replace so stale zones vanish.
            let zones: Vec<NewDailyZone> = match days.remove(&date) {
                Some(day_positions) => {
                    let params = Arc::clone(&self.params);
                    let computed = tokio::task::spawn_blocking(move || {
                        analyze_day(date, &day_positions, &params)
                    })
                    .await;
                    match computed {
                        Ok(analysis) => {
                            if analysis.degenerate_clusters > 0 {
                                warn!(
                                    equipment_id = equipment.id,
                                    date = %date,
                                    clusters = analysis.degenerate_clusters,
                                    "Skipped degenerate clusters"
                                );
                            }
                            debug!(
                                equipment_id = equipment.id,
                                date = %date,
                                zones = analysis.zones.len(),
                                noise = analysis.noise_points,
                                "Day analyzed"
                            );
                            analysis.zones
                        }
                        Err(e) => {
                            record_analysis_failure("day");
                            error!(equipment_id = equipment.id, date = %date, error = %e, "Day analysis panicked");
                            report.failed_days.push(date);
                            continue;
                        }
                    }
                }
                None => Vec::new(),
            };

            match self.stores.zones.replace_day(equipment.id, date, &zones).await {
                Ok(stored) => {
                    report.days_analyzed += 1;
                    report.zones += stored.len();
                }
                Err(e) => {
                    record_analysis_failure("day");
                    error!(equipment_id = equipment.id, date = %date, error = %e, "Failed to store zones");
                    report.failed_days.push(date);
                }
            }
        }
        record_zones_computed(report.zones);

        let all_zones = self.stores.zones.list_for_equipment(equipment.id).await?;
        match tokio::task::spawn_blocking(move || totals(&all_zones)).await {
            Ok(totals) => {
                self.stores.equipment.update_totals(equipment.id, &totals).await?;
                report.total_hectares = totals.total_hectares;
                report.relative_hectares = totals.relative_hectares;
                report.distance_between_zones_m = totals.distance_between_zones_m;
            }
            Err(e) => {
                record_analysis_failure("totals");
                error!(equipment_id = equipment.id, error = %e, "Totals computation panicked");
            }
        }

        let elapsed = started.elapsed();
        record_analysis_duration(elapsed.as_secs_f64());
        info!(
            equipment_id = equipment.id,
            days = report.days_analyzed,
            zones = report.zones,
            failed_days = report.failed_days.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Equipment analyzed"
        );
        Ok(report)
    }
}

fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), CoreError> {
    if from > to {
        return Err(CoreError::InvalidRange(format!("{from} is after {to}")));
    }
    if (to - from).num_days() >= MAX_RANGE_DAYS {
        return Err(CoreError::InvalidRange(format!(
            "range exceeds {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use domain::models::{NewEquipment, NewPosition, PositionSource};
    use domain::services::EquipmentStore;
    use persistence::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 10).unwrap()
    }

    /// 6x6 grid at 10 m spacing starting at 08:00 UTC.
    fn field(base: DateTime<Utc>) -> Vec<NewPosition> {
        let mut fixes = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                fixes.push(NewPosition {
                    latitude: 45.0 + f64::from(i) * 0.00009,
                    longitude: 4.0 + f64::from(j) * 0.000127,
                    timestamp: base + Duration::seconds(i64::from(i * 6 + j) * 30),
                    speed: None,
                    battery_level: None,
                    source: PositionSource::Push,
                });
            }
        }
        fixes
    }

    async fn seeded() -> (MemoryStore, AnalysisService, i64) {
        let store = MemoryStore::new();
        let stores = store.stores();
        let (equipment, _) = stores
            .equipment
            .find_or_create_by_push_id(&NewEquipment::from_push("baler", true, None))
            .await
            .unwrap();
        let base = Utc.with_ymd_and_hms(2024, 8, 10, 8, 0, 0).unwrap();
        stores.positions.insert_many(equipment.id, &field(base)).await.unwrap();
        let service = AnalysisService::new(stores, &AnalysisConfig::default());
        (store, service, equipment.id)
    }

    #[tokio::test]
    async fn test_analyze_one_is_idempotent() {
        let (store, service, id) = seeded().await;

        let first = service.analyze_one(id, date(), date()).await.unwrap();
        assert_eq!(first.zones, 1);
        let zones_first = store.stores().zones.list_for_equipment(id).await.unwrap();

        let second = service.analyze_one(id, date(), date()).await.unwrap();
        let zones_second = store.stores().zones.list_for_equipment(id).await.unwrap();

        assert_eq!(second.zones, first.zones);
        assert_eq!(zones_first.len(), zones_second.len());
        assert_eq!(zones_first[0].area_m2, zones_second[0].area_m2);
        assert!(second.total_hectares > 0.0);
    }

    #[tokio::test]
    async fn test_busy_equipment_conflicts() {
        let (_store, service, id) = seeded().await;
        let held = service.lock_for(id).lock_owned().await;

        let err = service.analyze_one(id, date(), date()).await.unwrap_err();
        assert!(matches!(err, CoreError::ConcurrentAnalysisConflict(e) if e == id));
        drop(held);

        assert!(service.analyze_one(id, date(), date()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_day_does_not_abort_range() {
        let (store, service, id) = seeded().await;
        let next = date().succ_opt().unwrap();
        store.fail_zone_writes_on(next).await;

        let report = service.analyze_one(id, date(), next).await.unwrap();
        assert_eq!(report.failed_days, vec![next]);
        assert_eq!(report.days_analyzed, 1);
        assert_eq!(report.zones, 1);
    }

    #[tokio::test]
    async fn test_invalid_range_and_unknown_equipment() {
        let (_store, service, _) = seeded().await;
        let err = service
            .analyze_one(1, date().succ_opt().unwrap(), date())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));

        let err = service.analyze_one(999, date(), date()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_analyze_all_skips_excluded() {
        let (store, service, id) = seeded().await;
        store.set_included(id, false).await.unwrap();

        let report = service.analyze_all(date(), date()).await.unwrap();
        assert_eq!(report.equipment, 0);
        assert!(store.stores().zones.list_for_equipment(id).await.unwrap().is_empty());
    }
}
