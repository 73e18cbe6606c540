//! Manual analysis handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::{AnalysisReport, SweepReport};

/// Optional date range. Both ends default to today; a lone `from` runs
/// to today and a lone `to` selects that single day.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AnalyzeRequest {
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::Validation(format!("invalid analysis request: {e}")))
    }

    fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match (self.from, self.to) {
            (None, None) => (today, today),
            (Some(from), None) => (from, today.max(from)),
            (None, Some(to)) => (to, to),
            (Some(from), Some(to)) => (from, to),
        }
    }
}

/// Re-analyze one equipment.
///
/// POST /api/v1/equipment/:id/analyze
pub async fn analyze_equipment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<AnalysisReport>, ApiError> {
    let (from, to) = AnalyzeRequest::parse(&body)?.resolve(state.analysis.today());
    let report = state.analysis.analyze_one(id, from, to).await?;
    Ok(Json(report))
}

/// Re-analyze every included equipment.
///
/// POST /api/v1/analyze
pub async fn analyze_all(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SweepReport>, ApiError> {
    let (from, to) = AnalyzeRequest::parse(&body)?.resolve(state.analysis.today());
    let report = state.analysis.analyze_all(from, to).await?;
    Ok(Json(report))
}
