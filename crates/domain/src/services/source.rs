//! Pull-based position source.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{Equipment, NewPosition};

/// A device known to the remote tracking server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDevice {
    pub id: i64,
    pub name: String,
    pub unique_id: Option<String>,
}

/// Remote server that is polled for positions.
#[async_trait::async_trait]
pub trait PullSource: Send + Sync {
    /// Devices to track.
    async fn fetch_devices(&self) -> Result<Vec<RemoteDevice>, CoreError>;

    /// Normalized fixes for `equipment` between `from` and `to`.
    async fn fetch_positions(
        &self,
        equipment: &Equipment,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewPosition>, CoreError>;
}

/// In-memory pull source for development and testing.
///
/// Returns canned devices and per-device fixes filtered to the requested
/// range.
#[derive(Debug, Default)]
pub struct MockPullSource {
    pub devices: Vec<RemoteDevice>,
    positions: Mutex<HashMap<i64, Vec<NewPosition>>>,
    /// Whether to simulate an unreachable server.
    pub simulate_failure: bool,
}

impl MockPullSource {
    pub fn new(devices: Vec<RemoteDevice>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Create a mock source that always fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Queue fixes for a remote device id.
    pub fn add_positions(&self, pull_id: i64, positions: Vec<NewPosition>) {
        if let Ok(mut map) = self.positions.lock() {
            map.entry(pull_id).or_default().extend(positions);
        }
    }
}

#[async_trait::async_trait]
impl PullSource for MockPullSource {
    async fn fetch_devices(&self) -> Result<Vec<RemoteDevice>, CoreError> {
        if self.simulate_failure {
            tracing::warn!("Mock pull source simulating failure");
            return Err(CoreError::SourceUnavailable("Simulated failure".to_string()));
        }
        Ok(self.devices.clone())
    }

    async fn fetch_positions(
        &self,
        equipment: &Equipment,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewPosition>, CoreError> {
        if self.simulate_failure {
            tracing::warn!(
                equipment_id = equipment.id,
                "Mock pull source simulating failure"
            );
            return Err(CoreError::SourceUnavailable("Simulated failure".to_string()));
        }
        let Some(pull_id) = equipment.pull_id else {
            return Ok(Vec::new());
        };
        let map = self
            .positions
            .lock()
            .map_err(|_| CoreError::SourceUnavailable("mock state poisoned".to_string()))?;
        Ok(map
            .get(&pull_id)
            .map(|fixes| {
                fixes
                    .iter()
                    .filter(|p| p.timestamp >= from && p.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionSource;
    use chrono::TimeZone;

    fn equipment(pull_id: Option<i64>) -> Equipment {
        let now = Utc::now();
        Equipment {
            id: 1,
            name: "Harvester".into(),
            pull_id,
            push_id: None,
            included_in_analysis: true,
            push_token: None,
            last_position: None,
            battery_level: None,
            total_hectares: 0.0,
            relative_hectares: 0.0,
            distance_between_zones_m: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 10, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_mock_filters_by_range() {
        let source = MockPullSource::new(vec![]);
        let fixes: Vec<NewPosition> = [6, 9, 12]
            .iter()
            .map(|h| NewPosition {
                latitude: 45.0,
                longitude: 4.0,
                timestamp: at(*h),
                speed: None,
                battery_level: None,
                source: PositionSource::Pull,
            })
            .collect();
        source.add_positions(7, fixes);

        let got = source
            .fetch_positions(&equipment(Some(7)), at(8), at(12))
            .await
            .unwrap();
        assert_eq!(got.len(), 2);

        let none = source
            .fetch_positions(&equipment(None), at(0), at(23))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let source = MockPullSource::failing();
        assert!(matches!(
            source.fetch_devices().await,
            Err(CoreError::SourceUnavailable(_))
        ));
    }
}
