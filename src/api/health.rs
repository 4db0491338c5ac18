use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::controller::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` once a cycle has completed, `starting` before
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub prediction_failures: u32,
    pub prediction_fetched_at: Option<DateTime<Utc>>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let predictions = state.controller.predictions().await;
    let status = if state.controller.latest_report().is_some() {
        "healthy"
    } else {
        "starting"
    };
    Json(HealthResponse {
        status,
        timestamp: Utc::now(),
        prediction_failures: predictions.consecutive_failures(),
        prediction_fetched_at: predictions.fetched_at(),
    })
}
