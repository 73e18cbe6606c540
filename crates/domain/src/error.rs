//! Domain error types.

use thiserror::Error;

/// Failure reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by ingestion and analysis.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The remote tracking server could not be reached or answered with an error.
    #[error("Position source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No valid polygon could be produced for a cluster, even after every fallback.
    #[error("Degenerate geometry: {0}")]
    GeometryDegenerate(String),

    #[error("Analysis already running for equipment {0}")]
    ConcurrentAnalysisConflict(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
