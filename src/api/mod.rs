pub mod error;
pub mod health;
pub mod response;
pub mod stats;
pub mod status;

use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, controller::AppState};

/// Read-only HTTP view of the controller
pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/data", get(status::get_latest_report))
        .route("/api/prediction", get(status::get_prediction))
        .route("/api/stats", get(stats::get_totals))
        .route("/api/safety/events", get(stats::list_safety_events))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            cfg.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
}
