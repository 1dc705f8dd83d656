use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, state::AppState};

const MAX_WINDOW: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Number of most recent global events to scan. Defaults to
    /// `PAGETRAIL_ANALYTICS_WINDOW`.
    pub window: Option<usize>,
}

fn resolve_window(window: Option<usize>) -> Result<Option<usize>, AppError> {
    match window {
        Some(w) if !(1..=MAX_WINDOW).contains(&w) => Err(AppError::bad_request(
            "window",
            format!("window must be between 1 and {MAX_WINDOW}"),
        )),
        other => Ok(other),
    }
}

/// `GET /api/analytics/pages`: most visited pages.
pub async fn most_visited(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(query.window)?;
    let rows = state.tracker.get_most_visited_pages(window).await;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/analytics/exits`: exit-page distribution.
pub async fn exit_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(query.window)?;
    let rows = state.tracker.get_exit_pages(window).await;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/analytics/transitions`: page-to-page transition counts.
pub async fn transitions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(query.window)?;
    let rows = state.tracker.get_page_transitions(window).await;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/analytics/stay-time`: dwell statistics per page.
pub async fn stay_time(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(query.window)?;
    let rows = state.tracker.get_stay_time_stats(window).await;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/analytics/funnel`: entry pages and exit flows.
pub async fn funnel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = resolve_window(query.window)?;
    let analysis = state.tracker.get_funnel_analysis(window).await;
    Ok(Json(json!({ "data": analysis })))
}
