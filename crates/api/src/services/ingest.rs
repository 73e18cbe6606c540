//! Push ingestion.
//!
//! Resolves pushed readings to equipment, checks device tokens and stores
//! the fixes. Every device of a request is authorized before anything is
//! written, so a rejected request leaves no trace.

use std::sync::Arc;

use domain::error::CoreError;
use domain::models::{Equipment, InsertOutcome, LastPosition, NewEquipment, NewPosition};
use domain::services::{PushBatch, Stores};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PushConfig;
use crate::middleware::metrics::{
    record_equipment_provisioned, record_positions_duplicate, record_positions_ingested,
};

/// Counts reported back to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub devices: usize,
    /// Equipment created by this request.
    pub provisioned: usize,
}

/// One device of a request, after authorization.
struct Authorized {
    push_id: String,
    equipment: Option<Equipment>,
    positions: Vec<NewPosition>,
}

#[derive(Clone)]
pub struct IngestService {
    stores: Stores,
    config: Arc<PushConfig>,
}

impl IngestService {
    pub fn new(stores: Stores, config: PushConfig) -> Self {
        Self {
            stores,
            config: Arc::new(config),
        }
    }

    /// Stores the accepted readings of `batch`.
    ///
    /// `token` is the credential presented by the caller, from whichever
    /// channel carried it. Zone analysis is never triggered from here.
    pub async fn ingest(
        &self,
        batch: &PushBatch,
        token: Option<&str>,
    ) -> Result<IngestSummary, CoreError> {
        let mut summary = IngestSummary {
            rejected: batch.rejected.len(),
            ..IngestSummary::default()
        };

        let mut authorized = Vec::new();
        for (push_id, positions) in batch.by_device() {
            authorized.push(self.authorize(push_id, positions, token).await?);
        }
        summary.devices = authorized.len();

        for device in authorized {
            let equipment = match device.equipment {
                Some(equipment) => equipment,
                None => {
                    let (equipment, created) = self.provision(&device.push_id).await?;
                    if created {
                        summary.provisioned += 1;
                    }
                    equipment
                }
            };

            let outcome = store_positions(&self.stores, &equipment, &device.positions).await?;
            summary.accepted += outcome.inserted;
            summary.duplicates += outcome.duplicates;
        }

        record_positions_ingested("push", summary.accepted);
        record_positions_duplicate("push", summary.duplicates);
        debug!(
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            devices = summary.devices,
            "Push request ingested"
        );
        Ok(summary)
    }

    async fn authorize(
        &self,
        push_id: String,
        positions: Vec<NewPosition>,
        token: Option<&str>,
    ) -> Result<Authorized, CoreError> {
        let equipment = self.stores.equipment.find_by_push_id(&push_id).await?;

        let expected = match &equipment {
            Some(existing) => existing.push_token.as_deref(),
            None if !self.config.auto_provision => {
                warn!(push_id = %push_id, "Push from unknown device with provisioning disabled");
                return Err(CoreError::Unauthorized(format!("unknown device {push_id}")));
            }
            None => self.config.provisioning_token.as_deref(),
        };

        if let Some(expected) = expected.filter(|t| !t.is_empty()) {
            let supplied = token.unwrap_or_default();
            if !shared::crypto::tokens_match(expected, supplied) {
                warn!(
                    push_id = %push_id,
                    presented = ?token.map(shared::crypto::token_fingerprint),
                    "Push rejected: device token mismatch"
                );
                return Err(CoreError::Unauthorized(format!(
                    "invalid or missing token for device {push_id}"
                )));
            }
        }

        Ok(Authorized {
            push_id,
            equipment,
            positions,
        })
    }

    async fn provision(&self, push_id: &str) -> Result<(Equipment, bool), CoreError> {
        let new = NewEquipment::from_push(
            push_id,
            self.config.include_new_in_analysis,
            self.config.provisioning_token.clone().filter(|t| !t.is_empty()),
        );
        let (equipment, created) = self.stores.equipment.find_or_create_by_push_id(&new).await?;
        if created {
            record_equipment_provisioned("push");
            info!(
                equipment_id = equipment.id,
                push_id = %push_id,
                "Provisioned equipment from push"
            );
        }
        Ok((equipment, created))
    }
}

/// Appends fixes for one equipment and refreshes its last-known position
/// and battery cache from the newest of them.
pub async fn store_positions(
    stores: &Stores,
    equipment: &Equipment,
    positions: &[NewPosition],
) -> Result<InsertOutcome, CoreError> {
    let outcome = stores.positions.insert_many(equipment.id, positions).await?;

    let Some(newest) = positions.iter().max_by_key(|p| p.timestamp) else {
        return Ok(outcome);
    };
    let battery = positions
        .iter()
        .filter(|p| p.battery_level.is_some())
        .max_by_key(|p| p.timestamp)
        .and_then(|p| p.battery_level);
    if let Some(level) = battery {
        info!("Device {} battery at {}%", equipment.name, level);
    }

    let last = LastPosition {
        latitude: newest.latitude,
        longitude: newest.longitude,
        timestamp: newest.timestamp,
    };
    stores
        .equipment
        .update_last_position(equipment.id, &last, battery)
        .await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::services::parse_json_payload;
    use persistence::MemoryStore;
    use serde_json::json;

    fn config(provisioning_token: Option<&str>, auto_provision: bool) -> PushConfig {
        PushConfig {
            auto_provision,
            include_new_in_analysis: true,
            provisioning_token: provisioning_token.map(str::to_string),
            max_body_size: 1024 * 1024,
        }
    }

    fn batch(device: &str) -> PushBatch {
        let body = json!({
            "device_id": device,
            "locations": [
                {"lat": 45.0, "lon": 4.0, "timestamp": 1723293296, "batt": 80},
                {"lat": 45.001, "lon": 4.001, "timestamp": 1723293356, "batt": 79},
                {"lat": 95.0, "lon": 4.0, "timestamp": 1723293416}
            ]
        });
        parse_json_payload(&body, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_provisions_and_stores() {
        let store = MemoryStore::new();
        let service = IngestService::new(store.stores(), config(None, true));

        let summary = service.ingest(&batch("mower-1"), None).await.unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.provisioned, 1);

        let equipment = store
            .stores()
            .equipment
            .find_by_push_id("mower-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(equipment.pull_id, None);
        assert_eq!(equipment.battery_level, Some(79));
        let last = equipment.last_position.unwrap();
        assert_eq!(last.timestamp, Utc.timestamp_opt(1723293356, 0).unwrap());

        let again = service.ingest(&batch("mower-1"), None).await.unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(again.provisioned, 0);
    }

    #[tokio::test]
    async fn test_unknown_device_rejected_when_provisioning_disabled() {
        let store = MemoryStore::new();
        let service = IngestService::new(store.stores(), config(None, false));

        let err = service.ingest(&batch("ghost"), None).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert!(store.stores().equipment.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provisioning_token_required_for_new_devices() {
        let store = MemoryStore::new();
        let service = IngestService::new(store.stores(), config(Some("s3cret"), true));

        let err = service.ingest(&batch("tractor-9"), Some("wrong")).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert!(store.stores().equipment.list().await.unwrap().is_empty());

        let summary = service.ingest(&batch("tractor-9"), Some("s3cret")).await.unwrap();
        assert_eq!(summary.accepted, 2);
        let equipment = store
            .stores()
            .equipment
            .find_by_push_id("tractor-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(equipment.push_token.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_one_unauthorized_device_stores_nothing() {
        let store = MemoryStore::new();
        let open = IngestService::new(store.stores(), config(None, true));
        open.ingest(&batch("known"), None).await.unwrap();

        let locked = IngestService::new(store.stores(), config(Some("tok"), true));
        let body = json!({
            "devices": [
                {"device_id": "known", "lat": 45.01, "lon": 4.01, "timestamp": 1723300000},
                {"device_id": "fresh", "lat": 45.02, "lon": 4.02, "timestamp": 1723300000}
            ]
        });
        let bulk = parse_json_payload(&body, Utc::now()).unwrap();
        let err = locked.ingest(&bulk, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let stores = store.stores();
        assert!(stores.equipment.find_by_push_id("fresh").await.unwrap().is_none());
        let known = stores.equipment.find_by_push_id("known").await.unwrap().unwrap();
        let latest = stores.positions.latest(known.id).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, Utc.timestamp_opt(1723293356, 0).unwrap());
    }
}
