//! Background job scheduler and job implementations.

mod nightly_analysis;
mod pool_metrics;
mod position_refresh;
mod scheduler;

pub use nightly_analysis::NightlyAnalysisJob;
pub use pool_metrics::PoolMetricsJob;
pub use position_refresh::PositionRefreshJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
