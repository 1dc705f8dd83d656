use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use pagetrail_core::config::Config;
use pagetrail_duckdb::DuckDbBackend;
use pagetrail_server::{app::build_app, scheduler, state::AppState};

/// `pagetrail health`: exit 0 when the local server answers `/health` with
/// 200, 1 otherwise. Used as the container HEALTHCHECK.
fn run_health_check() -> ! {
    let port = std::env::var("PAGETRAIL_PORT").unwrap_or_else(|_| "3000".to_string());
    match ureq::get(&format!("http://localhost:{port}/health")).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

fn log_tracking_setup(cfg: &Config) {
    match &cfg.excluded_email {
        Some(email) => info!(excluded_email = %email, "Operator traffic filtered from analytics"),
        None => info!("PAGETRAIL_EXCLUDED_EMAIL unset; analytics include every user"),
    }
    info!(
        window = cfg.analytics_window,
        timezone = %cfg.rollup_timezone,
        scheduler = cfg.rollup_scheduler,
        "Analytics configured"
    );
}

fn spawn_rollup_scheduler(state: &Arc<AppState>) {
    if !state.config.rollup_scheduler {
        info!("Hourly rollup scheduler disabled; run pagetrail-rollup from cron instead");
        return;
    }
    let state = Arc::clone(state);
    tokio::spawn(async move {
        scheduler::run_rollup_loop(state).await;
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().nth(1).as_deref() == Some("health") {
        run_health_check();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pagetrail=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    log_tracking_setup(&cfg);

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db = DuckDbBackend::open(&cfg.db_path(), &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));
    spawn_rollup_scheduler(&state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(port = cfg.port, db_path = %cfg.db_path(), "Pagetrail listening on {}", addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
