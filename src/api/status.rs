use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
    domain::{Prediction, StatusReport},
};

/// GET /api/data - report produced by the most recent cycle
pub async fn get_latest_report(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusReport>>, ApiError> {
    state
        .controller
        .latest_report()
        .map(|report| Json(ApiResponse::success(report)))
        .ok_or_else(|| ApiError::ServiceUnavailable("no decision cycle has run yet".into()))
}

#[derive(Debug, Serialize)]
pub struct PredictionInfo {
    pub prediction: Option<Prediction>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// GET /api/prediction - cached prediction and fetch health
pub async fn get_prediction(State(state): State<AppState>) -> Json<ApiResponse<PredictionInfo>> {
    let cache = state.controller.predictions().await;
    Json(ApiResponse::success(PredictionInfo {
        prediction: cache.latest().cloned(),
        fetched_at: cache.fetched_at(),
        age_secs: cache.age(Utc::now()).map(|age| age.num_seconds()),
        consecutive_failures: cache.consecutive_failures(),
        last_error: cache.last_error().map(|e| e.to_string()),
    }))
}
