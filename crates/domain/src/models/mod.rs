//! Domain models for FieldZone.

pub mod daily_zone;
pub mod equipment;
pub mod position;

pub use daily_zone::{DailyZone, NewDailyZone, Ring, ZoneMethod, M2_PER_HECTARE};
pub use equipment::{Equipment, EquipmentTotals, LastPosition, NewEquipment};
pub use position::{InsertOutcome, NewPosition, Position, PositionSource};
