//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod daily_zone;
pub mod equipment;
pub mod position;

pub use daily_zone::{boundary_to_geometry, geometry_to_boundary, DailyZoneEntity};
pub use equipment::EquipmentEntity;
pub use position::PositionEntity;
