//! Persistence layer for FieldZone.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - PostgreSQL repositories implementing the domain store traits
//! - An in-memory store with the same semantics

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;

pub use memory::MemoryStore;
pub use repositories::pg_stores;
