//! Custom Axum extractors.

pub mod device_token;

pub use device_token::{DeviceToken, DEVICE_TOKEN_HEADER};
