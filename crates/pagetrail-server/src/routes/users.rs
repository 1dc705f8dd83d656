use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, state::AppState};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

fn resolve_limit(limit: Option<usize>) -> Result<usize, AppError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::bad_request(
            "limit",
            format!("limit must be between 1 and {MAX_LIMIT}"),
        ));
    }
    Ok(limit)
}

fn resolve_user_id(raw: &str) -> Result<&str, AppError> {
    let user_id = raw.trim();
    if user_id.is_empty() {
        return Err(AppError::bad_request("userId", "userId is required"));
    }
    Ok(user_id)
}

/// `GET /api/users/{user_id}/navigation`: the user's most recent events,
/// newest first.
pub async fn user_navigation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_id(&user_id)?;
    let limit = resolve_limit(query.limit)?;
    let events = state.tracker.get_user_page_navigation(user_id, limit).await;
    Ok(Json(json!({ "data": events })))
}

/// `GET /api/users/{user_id}/journey`: same events, re-sorted by timestamp.
pub async fn user_journey(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_id(&user_id)?;
    let limit = resolve_limit(query.limit)?;
    let events = state
        .tracker
        .get_user_navigation_journey(user_id, limit)
        .await;
    Ok(Json(json!({ "data": events })))
}

/// `GET /api/users/{user_id}/last-page`
pub async fn user_last_page(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_user_id(&user_id)?;
    let page = state.tracker.get_user_last_page(user_id).await;
    Ok(Json(json!({ "data": { "page": page } })))
}

/// `GET /api/navigation`: navigation state of every user in the most recent
/// `limit * 10` global events.
pub async fn all_users_navigation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = resolve_limit(query.limit)?;
    let users = state.tracker.get_all_users_page_navigation(limit).await;
    Ok(Json(json!({ "data": users })))
}
