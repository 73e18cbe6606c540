//! Battery level normalization.
//!
//! Accepts a percentage (0-100), a fraction (0-1, scaled by 100), or an
//! object carrying either under `level`. Negative values mean "unknown".

use serde_json::{Map, Value};

/// Attribute keys, in priority order, under which remote tracking servers
/// report battery level.
pub const BATTERY_ATTRIBUTE_KEYS: [&str; 3] = ["batteryLevel", "battery_level", "batteryPercent"];

/// Keys checked on a pushed reading.
pub const PUSH_BATTERY_KEYS: [&str; 4] = ["battery", "batt", "battery_level", "batteryLevel"];

/// Normalizes a raw battery reading to a whole percentage.
pub fn normalize_battery_level(raw: f64) -> Option<i32> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let percent = if raw <= 1.0 { raw * 100.0 } else { raw };
    let level = percent.round() as i32;
    shared::validation::validate_battery_level(level).ok()?;
    Some(level)
}

/// Normalizes a JSON battery value: number, numeric string or `{"level": ..}`.
pub fn battery_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_f64().and_then(normalize_battery_level),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(normalize_battery_level),
        Value::Object(map) => map.get("level").and_then(|level| match level {
            Value::Object(_) => None,
            other => battery_from_value(other),
        }),
        _ => None,
    }
}

/// First recognized battery attribute in a vendor attribute map.
pub fn battery_from_attributes(attributes: &Map<String, Value>) -> Option<i32> {
    first_battery(attributes, &BATTERY_ATTRIBUTE_KEYS)
}

/// First recognized battery field on a pushed reading.
pub fn battery_from_reading(reading: &Map<String, Value>) -> Option<i32> {
    first_battery(reading, &PUSH_BATTERY_KEYS)
}

fn first_battery(map: &Map<String, Value>, keys: &[&str]) -> Option<i32> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(battery_from_value)
}
