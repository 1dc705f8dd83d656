use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

async fn rollup_status(state: &AppState) -> Value {
    let last = state.last_rollup.read().await;
    json!({
        "scheduler": state.config.rollup_scheduler,
        "timezone": state.config.rollup_timezone.to_string(),
        "tickSeconds": state.config.rollup_tick_seconds,
        "lastHourKey": last.as_ref().map(|a| a.hour_key.clone()),
        "lastRunAt": last.as_ref().map(|a| a.updated_at),
    })
}

/// `GET /health`: DuckDB reachability plus the rollup scheduler's state.
///
/// `200` when the store answers a ping, `503` otherwise. The rollup block is
/// informational and never changes the status code.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, label) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "Health check: DuckDB unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    let body = json!({
        "status": label,
        "version": env!("CARGO_PKG_VERSION"),
        "rollup": rollup_status(&state).await,
    });
    (status, Json(body))
}
