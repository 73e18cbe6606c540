//! Parsing of device push payloads.
//!
//! Supported shapes:
//! - OsmAnd query string: `?id=..&lat=..&lon=..&timestamp=..&speed=..&batt=..`
//! - a single reading: `{"device_id": .., "location": {..}}`
//! - a flat reading: `{"device_id": .., "lat": .., "lon": .., "timestamp": ..}`
//! - a batch: `{"device_id": .., "locations": [{..}, ..]}`
//! - a multi-device bulk upload: `{"devices": [{"device_id": .., "locations": [..]}]}`
//!
//! Each reading is validated on its own. A bad reading is recorded as
//! rejected and never fails its siblings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::battery::battery_from_reading;
use super::timestamp::parse_timestamp;
use crate::error::CoreError;
use crate::models::{NewPosition, PositionSource};

const DEVICE_ID_KEYS: [&str; 4] = ["device_id", "deviceId", "id", "deviceid"];
const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_KEYS: [&str; 3] = ["longitude", "lon", "lng"];
const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "time"];

const KNOTS_TO_KMH: f64 = 1.852;
const MPS_TO_KMH: f64 = 3.6;

/// A reading that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PushReading {
    pub device_id: String,
    pub position: NewPosition,
}

/// A reading that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub reason: String,
}

/// Parsed push request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushBatch {
    pub accepted: Vec<PushReading>,
    pub rejected: Vec<RejectedReading>,
}

impl PushBatch {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }

    /// Accepted readings grouped per device, in order of first appearance.
    pub fn by_device(&self) -> Vec<(String, Vec<NewPosition>)> {
        let mut groups: Vec<(String, Vec<NewPosition>)> = Vec::new();
        for reading in &self.accepted {
            match groups.iter_mut().find(|(id, _)| *id == reading.device_id) {
                Some((_, positions)) => positions.push(reading.position.clone()),
                None => groups.push((reading.device_id.clone(), vec![reading.position.clone()])),
            }
        }
        groups
    }

    fn reject(&mut self, device_id: Option<&str>, reason: impl Into<String>) {
        self.rejected.push(RejectedReading {
            device_id: device_id.map(str::to_string),
            reason: reason.into(),
        });
    }
}

/// Parses a JSON push body.
///
/// Fails with `MalformedPayload` only when the document as a whole cannot be
/// interpreted (not an object, no device identifier, empty bulk list).
pub fn parse_json_payload(body: &Value, received_at: DateTime<Utc>) -> Result<PushBatch, CoreError> {
    let root = body
        .as_object()
        .ok_or_else(|| CoreError::MalformedPayload("expected a JSON object".to_string()))?;

    let mut batch = PushBatch::default();

    if let Some(devices) = root.get("devices") {
        let devices = devices
            .as_array()
            .ok_or_else(|| CoreError::MalformedPayload("`devices` must be an array".to_string()))?;
        for device in devices {
            match device.as_object() {
                Some(entry) => match device_identifier(entry) {
                    Some(device_id) => parse_device_entry(entry, &device_id, received_at, &mut batch),
                    None => batch.reject(None, "missing device identifier"),
                },
                None => batch.reject(None, "device entry is not an object"),
            }
        }
        return Ok(batch);
    }

    let device_id = device_identifier(root)
        .ok_or_else(|| CoreError::MalformedPayload("missing device identifier".to_string()))?;
    parse_device_entry(root, &device_id, received_at, &mut batch);
    Ok(batch)
}

/// Parses an OsmAnd-style query string reading.
pub fn parse_query_payload(
    params: &HashMap<String, String>,
    received_at: DateTime<Utc>,
) -> Result<PushBatch, CoreError> {
    let object: Map<String, Value> = params
        .iter()
        .filter(|(key, _)| key.as_str() != "token")
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    if object.is_empty() {
        return Err(CoreError::MalformedPayload("empty request".to_string()));
    }
    parse_json_payload(&Value::Object(object), received_at)
}

fn parse_device_entry(
    entry: &Map<String, Value>,
    device_id: &str,
    received_at: DateTime<Utc>,
    batch: &mut PushBatch,
) {
    let readings: Vec<&Value> = match (entry.get("locations"), entry.get("location")) {
        (Some(Value::Array(items)), _) => items.iter().collect(),
        (Some(_), _) => {
            batch.reject(Some(device_id), "`locations` must be an array");
            return;
        }
        (None, Some(Value::Array(items))) => items.iter().collect(),
        (None, Some(single)) => vec![single],
        (None, None) => {
            // Flat reading: the entry itself carries the coordinates.
            match parse_reading(entry, received_at) {
                Ok(position) => batch.accepted.push(PushReading {
                    device_id: device_id.to_string(),
                    position,
                }),
                Err(reason) => batch.reject(Some(device_id), reason),
            }
            return;
        }
    };

    for reading in readings {
        let Some(object) = reading.as_object() else {
            batch.reject(Some(device_id), "reading is not an object");
            continue;
        };
        match parse_reading(object, received_at) {
            Ok(position) => batch.accepted.push(PushReading {
                device_id: device_id.to_string(),
                position,
            }),
            Err(reason) => batch.reject(Some(device_id), reason),
        }
    }
}

/// Validates one reading. Returns the rejection reason on failure.
fn parse_reading(reading: &Map<String, Value>, received_at: DateTime<Utc>) -> Result<NewPosition, String> {
    let coords = reading.get("coords").and_then(Value::as_object);

    let latitude = coords
        .and_then(|c| number_field(c, &LATITUDE_KEYS))
        .or_else(|| number_field(reading, &LATITUDE_KEYS))
        .ok_or_else(|| "missing latitude".to_string())?;
    let longitude = coords
        .and_then(|c| number_field(c, &LONGITUDE_KEYS))
        .or_else(|| number_field(reading, &LONGITUDE_KEYS))
        .ok_or_else(|| "missing longitude".to_string())?;
    shared::validation::validate_coordinates(latitude, longitude)
        .map_err(|_| format!("coordinates out of range: {latitude}, {longitude}"))?;

    let timestamp = match first_present(reading, &TIMESTAMP_KEYS) {
        Some(value) => parse_timestamp(value).map_err(|e| e.to_string())?,
        None => received_at,
    };

    // Background-geolocation reports m/s under `coords`, OsmAnd reports knots.
    let speed = coords
        .and_then(|c| number_field(c, &["speed"]))
        .map(|mps| mps * MPS_TO_KMH)
        .or_else(|| number_field(reading, &["speed"]).map(|knots| knots * KNOTS_TO_KMH))
        .filter(|kmh| shared::validation::validate_speed(*kmh).is_ok());

    Ok(NewPosition {
        latitude,
        longitude,
        timestamp,
        speed,
        battery_level: battery_from_reading(reading),
        source: PositionSource::Push,
    })
}

fn device_identifier(entry: &Map<String, Value>) -> Option<String> {
    let raw = match first_present(entry, &DEVICE_ID_KEYS)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    shared::validation::validate_device_identifier(&raw).ok()?;
    Some(raw)
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn number_field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = match first_present(map, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 11, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_single_nested_reading() {
        let body = json!({
            "device_id": "tractor-1",
            "location": {
                "timestamp": "2024-08-10T12:34:56Z",
                "coords": {"latitude": 45.1, "longitude": 4.2, "speed": 2.0},
                "battery": {"level": 0.85, "is_charging": false}
            }
        });
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted.len(), 1);
        assert!(batch.rejected.is_empty());
        let reading = &batch.accepted[0];
        assert_eq!(reading.device_id, "tractor-1");
        assert_eq!(reading.position.latitude, 45.1);
        assert_eq!(reading.position.longitude, 4.2);
        assert_eq!(reading.position.battery_level, Some(85));
        assert!((reading.position.speed.unwrap() - 7.2).abs() < 1e-9);
        assert_eq!(reading.position.source, PositionSource::Push);
    }

    #[test]
    fn test_flat_reading_with_short_keys() {
        let body = json!({"id": 812, "lat": "45.5", "lon": "4.5", "timestamp": 1723293296});
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].device_id, "812");
        assert_eq!(batch.accepted[0].position.latitude, 45.5);
    }

    #[test]
    fn test_batch_isolates_bad_readings() {
        let body = json!({
            "device_id": "mower",
            "locations": [
                {"timestamp": 1723293296, "coords": {"latitude": 45.0, "longitude": 4.0}},
                {"timestamp": "not a time", "coords": {"latitude": 45.0, "longitude": 4.0}},
                {"timestamp": 1723293300, "coords": {"latitude": 45.0}},
                {"timestamp": 1723293310, "latitude": 95.0, "longitude": 4.0},
                {"timestamp": 1723293320, "lat": 45.0, "lng": 4.0}
            ]
        });
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.rejected.len(), 3);
        assert!(batch.rejected[1].reason.contains("longitude"));
        assert!(batch
            .rejected
            .iter()
            .all(|r| r.device_id.as_deref() == Some("mower")));
    }

    #[test]
    fn test_missing_timestamp_uses_receive_time() {
        let body = json!({"device_id": "a", "lat": 1.0, "lon": 2.0});
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted[0].position.timestamp, now());
    }

    #[test]
    fn test_multi_device_bulk() {
        let body = json!({
            "devices": [
                {"device_id": "a", "locations": [{"lat": 1.0, "lon": 2.0, "timestamp": 1723293296}]},
                {"locations": [{"lat": 1.0, "lon": 2.0}]},
                {"device_id": "b", "locations": [
                    {"lat": 3.0, "lon": 4.0, "timestamp": 1723293296},
                    {"lat": 3.1, "lon": 4.1, "timestamp": 1723293297}
                ]}
            ]
        });
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted.len(), 3);
        assert_eq!(batch.rejected.len(), 1);
        let groups = batch.by_device();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_missing_device_identifier_is_malformed() {
        let body = json!({"lat": 1.0, "lon": 2.0});
        assert!(matches!(
            parse_json_payload(&body, now()),
            Err(CoreError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_json_payload(&json!([1, 2]), now()),
            Err(CoreError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_query_payload() {
        let params: HashMap<String, String> = [
            ("id", "osm-7"),
            ("lat", "45.25"),
            ("lon", "4.75"),
            ("timestamp", "1723293296000"),
            ("speed", "10"),
            ("batt", "64"),
            ("token", "secret"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let batch = parse_query_payload(&params, now()).unwrap();
        assert_eq!(batch.accepted.len(), 1);
        let position = &batch.accepted[0].position;
        assert_eq!(batch.accepted[0].device_id, "osm-7");
        assert_eq!(position.timestamp.timestamp(), 1723293296);
        assert_eq!(position.battery_level, Some(64));
        assert!((position.speed.unwrap() - 18.52).abs() < 1e-9);
    }

    #[test]
    fn test_empty_query_is_malformed() {
        let params: HashMap<String, String> =
            [("token".to_string(), "x".to_string())].into_iter().collect();
        assert!(matches!(
            parse_query_payload(&params, now()),
            Err(CoreError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_negative_speed_is_dropped() {
        let body = json!({
            "device_id": "a",
            "location": {"coords": {"latitude": 1.0, "longitude": 2.0, "speed": -1}}
        });
        let batch = parse_json_payload(&body, now()).unwrap();
        assert_eq!(batch.accepted[0].position.speed, None);
    }
}
