//! Domain layer for FieldZone.
//!
//! This crate contains:
//! - Domain models (Equipment, Position, DailyZone)
//! - Ingestion parsing and zone geometry services
//! - Storage and source traits
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
