use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    let origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `CorsLayer`: the tracking script posts from the marketing site's
///    origin; `PAGETRAIL_CORS_ORIGINS` narrows it, empty means any.
/// 2. `CompressionLayer`: analytics reports can be large.
/// 3. `TraceLayer`: structured request/response logging via `tracing`.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/navigation/view", post(routes::navigation::log_view))
        .route("/api/navigation/exit", post(routes::navigation::log_exit))
        .route("/api/navigation", get(routes::users::all_users_navigation))
        .route(
            "/api/users/{user_id}/navigation",
            get(routes::users::user_navigation),
        )
        .route(
            "/api/users/{user_id}/journey",
            get(routes::users::user_journey),
        )
        .route(
            "/api/users/{user_id}/last-page",
            get(routes::users::user_last_page),
        )
        .route("/api/analytics/pages", get(routes::analytics::most_visited))
        .route("/api/analytics/exits", get(routes::analytics::exit_pages))
        .route(
            "/api/analytics/transitions",
            get(routes::analytics::transitions),
        )
        .route("/api/analytics/stay-time", get(routes::analytics::stay_time))
        .route("/api/analytics/funnel", get(routes::analytics::funnel))
        .route(
            "/api/activity/hourly/{hour_key}",
            get(routes::activity::hourly_activity),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
