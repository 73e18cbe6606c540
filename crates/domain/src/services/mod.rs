//! Domain services for FieldZone.
//!
//! Pure ingestion parsing and zone geometry, plus the storage and source
//! traits the outer layers implement.

pub mod battery;
pub mod boundary;
pub mod clustering;
pub mod projection;
pub mod push;
pub mod source;
pub mod store;
pub mod timestamp;
pub mod triangulation;
pub mod windowing;
pub mod zoning;

pub use battery::{
    battery_from_attributes, normalize_battery_level, BATTERY_ATTRIBUTE_KEYS, PUSH_BATTERY_KEYS,
};
pub use boundary::{boundary_and_area, BoundaryParams, ZonePiece};
pub use clustering::{cluster, dbscan, ClusterParams};
pub use projection::{LocalProjection, PlanarPoint};
pub use push::{parse_json_payload, parse_query_payload, PushBatch, PushReading, RejectedReading};
pub use source::{MockPullSource, PullSource, RemoteDevice};
pub use store::{EquipmentStore, PositionStore, Stores, ZoneStore};
pub use timestamp::{parse_timestamp, parse_timestamp_str, TimestampError};
pub use windowing::{dates_between, window, DayBoundary, DayWindow};
pub use zoning::{analyze_day, totals, zone_polygon, AnalysisParams, DayAnalysis};
