use std::time::Duration;

use crate::rollup::RollupTimezone;

/// Default number of global events each aggregator scans.
pub const DEFAULT_ANALYTICS_WINDOW: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    /// Operator identity whose own traffic is filtered out of every aggregate.
    /// `None` disables the filter.
    pub excluded_email: Option<String>,
    pub analytics_window: usize,
    pub rollup_timezone: RollupTimezone,
    pub rollup_scheduler: bool,
    pub rollup_tick_seconds: u64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("PAGETRAIL_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("PAGETRAIL_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("PAGETRAIL_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            excluded_email: std::env::var("PAGETRAIL_EXCLUDED_EMAIL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            analytics_window: std::env::var("PAGETRAIL_ANALYTICS_WINDOW")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_ANALYTICS_WINDOW),
            rollup_timezone: match std::env::var("PAGETRAIL_ROLLUP_TIMEZONE") {
                Ok(raw) if !raw.trim().is_empty() => {
                    RollupTimezone::parse(raw.trim()).map_err(|e| e.to_string())?
                }
                _ => RollupTimezone::Local,
            },
            rollup_scheduler: std::env::var("PAGETRAIL_ROLLUP_SCHEDULER")
                .map(|v| v != "false")
                .unwrap_or(true),
            rollup_tick_seconds: std::env::var("PAGETRAIL_ROLLUP_TICK_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|v| v.clamp(10, 3600))
                .unwrap_or(3600),
            cors_origins: std::env::var("PAGETRAIL_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }

    pub fn rollup_tick(&self) -> Duration {
        Duration::from_secs(self.rollup_tick_seconds)
    }

    pub fn db_path(&self) -> String {
        format!("{}/pagetrail.db", self.data_dir)
    }
}
