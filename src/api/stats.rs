use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::{AppState, EnergyTotals, SafetyRecord},
};

/// GET /api/stats - today's energy counters
pub async fn get_totals(State(state): State<AppState>) -> Json<ApiResponse<EnergyTotals>> {
    Json(ApiResponse::success(state.controller.totals()))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

const MAX_EVENTS: usize = 100;

/// GET /api/safety/events?limit=N - most recent safety events, oldest first
pub async fn list_safety_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<ApiResponse<Vec<SafetyRecord>>>, ApiError> {
    let limit = query.limit.unwrap_or(20);
    if limit == 0 || limit > MAX_EVENTS {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_EVENTS}"
        )));
    }
    let events = state.controller.recent_events(limit);
    Ok(Json(
        ApiResponse::success(events).with_count(state.controller.event_count()),
    ))
}
