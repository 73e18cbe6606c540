//! Device push endpoint handlers.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::services::{parse_json_payload, parse_query_payload, PushBatch, RejectedReading};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::app::AppState;
use crate::error::{ApiError, ValidationDetail};
use crate::extractors::DeviceToken;
use crate::middleware::metrics::record_push_rejected;

/// Push response.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RejectedReading>,
}

/// Ingest readings pushed by a device.
///
/// GET|POST /api/v1/push, GET|POST /osmand
///
/// A non-empty body is parsed as JSON; otherwise the query string carries a
/// single OsmAnd reading.
pub async fn push(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    token: DeviceToken,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PushResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            warn!(error = %rejection, "Unreadable push body");
            ApiError::MalformedPayload(format!("unreadable body: {rejection}"))
        }
    })?;

    let received_at = Utc::now();
    let batch = if body.iter().all(u8::is_ascii_whitespace) {
        parse_query_payload(&params, received_at)?
    } else {
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::MalformedPayload(format!("invalid JSON: {e}")))?;
        parse_json_payload(&json, received_at)?
    };

    reject_if_empty(&batch)?;

    let summary = state.ingest.ingest(&batch, token.as_deref()).await?;
    record_push_rejected(batch.rejected.len());

    Ok(Json(PushResponse {
        accepted: summary.accepted,
        duplicates: summary.duplicates,
        rejected: summary.rejected,
        rejections: batch.rejected,
    }))
}

fn reject_if_empty(batch: &PushBatch) -> Result<(), ApiError> {
    if !batch.accepted.is_empty() {
        return Ok(());
    }
    if batch.rejected.is_empty() {
        return Err(ApiError::MalformedPayload("no readings".to_string()));
    }

    record_push_rejected(batch.rejected.len());
    Err(ApiError::RejectedReadings(
        batch
            .rejected
            .iter()
            .map(|r| ValidationDetail {
                field: r.device_id.clone().unwrap_or_else(|| "reading".to_string()),
                message: r.reason.clone(),
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_malformed() {
        let err = reject_if_empty(&PushBatch::default()).unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
    }

    #[test]
    fn test_all_rejected_carries_details() {
        let batch = PushBatch {
            accepted: vec![],
            rejected: vec![RejectedReading {
                device_id: Some("t-1".into()),
                reason: "missing latitude".into(),
            }],
        };
        match reject_if_empty(&batch).unwrap_err() {
            ApiError::RejectedReadings(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "t-1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
