//! `pagetrail-rollup`: one-shot hourly activity rollup for cron.
//!
//! Takes no arguments. Exits 0 after the summary for the current hour is
//! written, 1 on any failure with a diagnostic on stderr.

use chrono::Utc;

use pagetrail_core::config::Config;
use pagetrail_core::rollup::run_hourly_rollup;
use pagetrail_duckdb::DuckDbBackend;

async fn run() -> anyhow::Result<()> {
    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db = DuckDbBackend::open(&cfg.db_path(), &cfg.duckdb_memory_limit)?;
    run_hourly_rollup(&db, Utc::now(), cfg.rollup_timezone).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagetrail=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("pagetrail-rollup: {e:#}");
        std::process::exit(1);
    }
}
