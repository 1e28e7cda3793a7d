use crate::services::worker_loop::LastSweep;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::info;

pub async fn not_found() -> impl IntoResponse {
    info!("worker router: not_found handler invoked");
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}

/// Liveness plus the outcome of the last booking sweep.
pub async fn health_check(State(last_sweep): State<LastSweep>) -> impl IntoResponse {
    let last = *last_sweep.read().await;
    let body = match last {
        Some((ran_at, report)) => json!({
            "status": "ok",
            "last_sweep_at": ran_at,
            "last_sweep": report,
        }),
        None => json!({ "status": "ok", "last_sweep_at": null }),
    };
    (StatusCode::OK, Json(body)).into_response()
}
