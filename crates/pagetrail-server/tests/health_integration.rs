use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use pagetrail_core::config::Config;
use pagetrail_core::rollup::RollupTimezone;
use pagetrail_duckdb::DuckDbBackend;
use pagetrail_server::app::build_app;
use pagetrail_server::scheduler::process_once;
use pagetrail_server::state::AppState;

fn config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/pagetrail-test".to_string(),
        duckdb_memory_limit: "1GB".to_string(),
        excluded_email: None,
        analytics_window: 1000,
        rollup_timezone: RollupTimezone::Local,
        rollup_scheduler: false,
        rollup_tick_seconds: 3600,
        cors_origins: vec!["https://example.com".to_string()],
    }
}

#[tokio::test]
async fn test_health_ok() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, config())));

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("request");
    assert_eq!(res.status(), StatusCode::OK);

    let bytes = res
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("parse JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["rollup"]["scheduler"], false);
    assert_eq!(body["rollup"]["timezone"], "local");
    assert_eq!(body["rollup"]["tickSeconds"], 3600);
    assert_eq!(body["rollup"]["lastHourKey"], Value::Null);
}

#[tokio::test]
async fn test_health_reports_last_rollup() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, config()));
    let app = build_app(Arc::clone(&state));

    let aggregate = process_once(&state).await.expect("rollup");

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("request");
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("parse JSON");
    assert_eq!(body["rollup"]["lastHourKey"], aggregate.hour_key.as_str());
    assert!(body["rollup"]["lastRunAt"].is_string());
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, config())));

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://example.com")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("request");
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://example.com")
    );
}
