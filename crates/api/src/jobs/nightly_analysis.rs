//! Nightly zone analysis sweep.

use chrono::Duration;

use super::scheduler::{Job, JobFrequency};
use crate::services::AnalysisService;

/// Re-analyzes the last few days of every included equipment.
///
/// Waits for equipment busy with a manual run instead of skipping it.
pub struct NightlyAnalysisJob {
    analysis: AnalysisService,
    lookback_days: i64,
    frequency: JobFrequency,
}

impl NightlyAnalysisJob {
    pub fn new(analysis: AnalysisService, lookback_days: i64, frequency: JobFrequency) -> Self {
        Self {
            analysis,
            lookback_days: lookback_days.max(0),
            frequency,
        }
    }
}

#[async_trait::async_trait]
impl Job for NightlyAnalysisJob {
    fn name(&self) -> &'static str {
        "nightly_analysis"
    }

    fn frequency(&self) -> JobFrequency {
        self.frequency
    }

    async fn execute(&self) -> Result<(), String> {
        let to = self.analysis.today();
        let from = to - Duration::days(self.lookback_days);

        let report = self
            .analysis
            .analyze_all(from, to)
            .await
            .map_err(|e| e.to_string())?;

        if report.failed_equipment.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "analysis failed for {} of {} equipment: {:?}",
                report.failed_equipment.len(),
                report.equipment,
                report.failed_equipment
            ))
        }
    }
}
