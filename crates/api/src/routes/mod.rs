//! HTTP route handlers.

pub mod analysis;
pub mod equipment;
pub mod health;
pub mod push;
