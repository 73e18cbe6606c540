//! Pull of new positions from the remote tracking server.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::models::NewEquipment;
use domain::services::{PullSource, Stores};
use tracing::{debug, info, warn};

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics::{
    record_equipment_provisioned, record_positions_duplicate, record_positions_ingested,
};
use crate::services::store_positions;

/// Syncs remote devices, then pulls each one's fixes since its last known
/// position. Never runs zone analysis.
pub struct PositionRefreshJob {
    source: Arc<dyn PullSource>,
    stores: Stores,
    lookback_hours: i64,
    interval_secs: u64,
}

impl PositionRefreshJob {
    pub fn new(
        source: Arc<dyn PullSource>,
        stores: Stores,
        lookback_hours: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            source,
            stores,
            lookback_hours,
            interval_secs,
        }
    }

    async fn sync_devices(&self) -> Result<(), String> {
        let devices = self.source.fetch_devices().await.map_err(|e| e.to_string())?;
        for device in devices {
            let new = NewEquipment::from_pull(device.id, &device.name);
            let (equipment, created) = self
                .stores
                .equipment
                .find_or_create_by_pull_id(&new)
                .await
                .map_err(|e| e.to_string())?;
            if created {
                record_equipment_provisioned("pull");
                info!(
                    equipment_id = equipment.id,
                    pull_id = device.id,
                    name = %device.name,
                    "Provisioned equipment from tracking server"
                );
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Job for PositionRefreshJob {
    fn name(&self) -> &'static str {
        "position_refresh"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        self.sync_devices().await?;

        let equipment = self
            .stores
            .equipment
            .list_pull_sourced()
            .await
            .map_err(|e| e.to_string())?;

        let now = Utc::now();
        let mut inserted = 0;
        let mut duplicates = 0;
        let mut failed = 0;
        for item in &equipment {
            let from = item
                .last_position
                .map(|last| last.timestamp)
                .unwrap_or_else(|| now - Duration::hours(self.lookback_hours));

            let positions = match self.source.fetch_positions(item, from, now).await {
                Ok(positions) => positions,
                Err(e) => {
                    warn!(equipment_id = item.id, error = %e, "Position pull failed");
                    failed += 1;
                    continue;
                }
            };
            if positions.is_empty() {
                continue;
            }

            match store_positions(&self.stores, item, &positions).await {
                Ok(outcome) => {
                    inserted += outcome.inserted;
                    duplicates += outcome.duplicates;
                    debug!(
                        equipment_id = item.id,
                        inserted = outcome.inserted,
                        duplicates = outcome.duplicates,
                        "Positions pulled"
                    );
                }
                Err(e) => {
                    warn!(equipment_id = item.id, error = %e, "Failed to store pulled positions");
                    failed += 1;
                }
            }
        }

        record_positions_ingested("pull", inserted);
        record_positions_duplicate("pull", duplicates);

        if failed > 0 && failed == equipment.len() {
            return Err(format!("position pull failed for all {failed} equipment"));
        }
        Ok(())
    }
}
