//! Traccar REST client.
//!
//! Polls `/api/devices` and `/api/positions` on a Traccar-compatible server
//! and normalizes the answers into domain positions.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use domain::error::CoreError;
use domain::models::{Equipment, NewPosition, PositionSource};
use domain::services::{battery_from_attributes, parse_timestamp_str, PullSource, RemoteDevice};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TraccarConfig;
use crate::middleware::metrics::record_source_error;

const KNOTS_TO_KMH: f64 = 1.852;

/// Errors that can occur while talking to the tracking server.
#[derive(Debug, Error)]
pub enum TraccarError {
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Tracking server error: HTTP {0}")]
    ServiceError(StatusCode),

    #[error("Invalid response from tracking server: {0}")]
    InvalidResponse(String),
}

impl From<TraccarError> for CoreError {
    fn from(err: TraccarError) -> Self {
        CoreError::SourceUnavailable(err.to_string())
    }
}

/// Position element as returned by `/api/positions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraccarPosition {
    latitude: Option<f64>,
    longitude: Option<f64>,
    device_time: Option<String>,
    fix_time: Option<String>,
    /// Knots.
    speed: Option<f64>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl TraccarPosition {
    fn normalize(self) -> Result<NewPosition, String> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err("missing coordinates".to_string());
        };
        shared::validation::validate_coordinates(latitude, longitude)
            .map_err(|_| format!("coordinates out of range: {latitude}, {longitude}"))?;

        let raw_time = self
            .device_time
            .as_deref()
            .or(self.fix_time.as_deref())
            .ok_or_else(|| "missing time".to_string())?;
        let timestamp = parse_timestamp_str(raw_time).map_err(|e| e.to_string())?;

        Ok(NewPosition {
            latitude,
            longitude,
            timestamp,
            speed: self
                .speed
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(|knots| knots * KNOTS_TO_KMH),
            battery_level: battery_from_attributes(&self.attributes),
            source: PositionSource::Pull,
        })
    }
}

/// Client for a Traccar-compatible tracking server.
pub struct TraccarClient {
    client: Client,
    config: TraccarConfig,
}

impl TraccarClient {
    /// Create a new client with the configured request timeout.
    pub fn new(config: TraccarConfig) -> Result<Self, TraccarError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GETs a JSON array. 404, 204 and an empty body all mean "no data".
    async fn get_array(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, TraccarError> {
        let url = self.url(path);
        debug!(url = %url, "Calling tracking server");

        let mut request = self.client.get(&url).query(query);
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TraccarError::Timeout(self.config.timeout_ms)
            } else {
                TraccarError::Request(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(TraccarError::ServiceError(status));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(_) => Err(TraccarError::InvalidResponse(
                "expected a JSON array".to_string(),
            )),
            Err(e) => Err(TraccarError::InvalidResponse(e.to_string())),
        }
    }

    async fn devices(&self) -> Result<Vec<RemoteDevice>, TraccarError> {
        let items = self.get_array("/api/devices", &[]).await?;
        let wanted = self
            .config
            .device_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RemoteDevice>(item) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed device entry");
                    None
                }
            })
            .filter(|device| wanted.map_or(true, |name| device.name == name))
            .collect())
    }

    async fn positions(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewPosition>, TraccarError> {
        let query = [
            ("deviceId", device_id.to_string()),
            ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let items = self.get_array("/api/positions", &query).await?;

        let mut positions = Vec::with_capacity(items.len());
        for item in items {
            let parsed = serde_json::from_value::<TraccarPosition>(item)
                .map_err(|e| e.to_string())
                .and_then(TraccarPosition::normalize);
            match parsed {
                Ok(position) => positions.push(position),
                Err(reason) => warn!(device_id, reason = %reason, "Dropping position"),
            }
        }
        Ok(positions)
    }
}

#[async_trait::async_trait]
impl PullSource for TraccarClient {
    async fn fetch_devices(&self) -> Result<Vec<RemoteDevice>, CoreError> {
        self.devices().await.map_err(|e| {
            record_source_error("devices");
            warn!(error = %e, "Failed to list devices");
            e.into()
        })
    }

    async fn fetch_positions(
        &self,
        equipment: &Equipment,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewPosition>, CoreError> {
        let Some(device_id) = equipment.pull_id else {
            return Ok(Vec::new());
        };
        self.positions(device_id, from, to).await.map_err(|e| {
            record_source_error("positions");
            warn!(equipment_id = equipment.id, error = %e, "Failed to fetch positions");
            e.into()
        })
    }
}
