//! Application services.

pub mod analysis;
pub mod ingest;
pub mod traccar;

pub use analysis::{AnalysisReport, AnalysisService, SweepReport};
pub use ingest::{store_positions, IngestService, IngestSummary};
pub use traccar::{TraccarClient, TraccarError};
