use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use pagetrail_core::event::{PageExitPayload, PageViewPayload, MAX_DWELL_MS};

use crate::{error::AppError, state::AppState};

const MAX_ID_LEN: usize = 256;
const MAX_PAGE_LEN: usize = 2048;
const MAX_EMAIL_LEN: usize = 320;

fn required(field: &'static str, value: &str, max_len: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(field, format!("{field} is required")));
    }
    if trimmed.len() > max_len {
        return Err(AppError::bad_request(
            field,
            format!("{field} is too long (max {max_len} characters)"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Blank optional strings are treated as absent.
fn optional(
    field: &'static str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max_len).map(Some),
    }
}

fn accepted() -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "data": { "accepted": true } })),
    )
}

/// `POST /api/navigation/view`: record a navigation.
///
/// Responds `202` once the payload validates. Storage failures are logged by
/// the tracker and never reach the client.
pub async fn log_view(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PageViewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = required("userId", &payload.user_id, MAX_ID_LEN)?;
    let current_page = required("currentPage", &payload.current_page, MAX_PAGE_LEN)?;
    let session_id = required("sessionId", &payload.session_id, MAX_ID_LEN)?;
    let previous_page = optional("previousPage", payload.previous_page, MAX_PAGE_LEN)?;
    let user_email = optional("userEmail", payload.user_email, MAX_EMAIL_LEN)?;

    state
        .tracker
        .log_page_view(
            &user_id,
            &current_page,
            previous_page.as_deref(),
            &session_id,
            user_email.as_deref(),
        )
        .await;

    Ok(accepted())
}

/// `POST /api/navigation/exit`: record leaving a page.
pub async fn log_exit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PageExitPayload>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = required("userId", &payload.user_id, MAX_ID_LEN)?;
    let exit_page = required("exitPage", &payload.exit_page, MAX_PAGE_LEN)?;
    let session_id = required("sessionId", &payload.session_id, MAX_ID_LEN)?;
    let user_email = optional("userEmail", payload.user_email, MAX_EMAIL_LEN)?;
    let time_spent = payload.time_spent_on_page.unwrap_or(0);
    if time_spent > MAX_DWELL_MS {
        return Err(AppError::bad_request(
            "timeSpentOnPage",
            format!("timeSpentOnPage must be at most {MAX_DWELL_MS}"),
        ));
    }

    state
        .tracker
        .log_page_exit(
            &user_id,
            &exit_page,
            &session_id,
            time_spent,
            user_email.as_deref(),
        )
        .await;

    Ok(accepted())
}
