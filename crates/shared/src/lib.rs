//! Shared utilities and common types for the FieldZone backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Device token comparison and fingerprinting
//! - Coordinate, speed and battery validation

pub mod crypto;
pub mod validation;
