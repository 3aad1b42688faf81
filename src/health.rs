use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Liveness probe; answers as long as the process is up.
pub async fn simple_health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "up" })))
}

/// Readiness probe; verifies the database answers.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match crate::db::ping(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "database": "up" })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "down" })),
        ),
    }
}
