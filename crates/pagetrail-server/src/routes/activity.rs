use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use pagetrail_core::rollup::validate_hour_key;
use pagetrail_core::store::EventStore;

use crate::{error::AppError, state::AppState};

/// `GET /api/activity/hourly/{hour_key}`: one persisted hourly summary.
///
/// Store failures surface as 500, unlike the tracker-backed reads.
pub async fn hourly_activity(
    State(state): State<Arc<AppState>>,
    Path(hour_key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validate_hour_key(&hour_key).map_err(|e| AppError::bad_request("hourKey", e.to_string()))?;

    let aggregate = state
        .db
        .hourly_activity(&hour_key)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("No activity recorded for {hour_key}")))?;

    Ok(Json(json!({ "data": aggregate })))
}
