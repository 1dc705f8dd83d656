use std::sync::Arc;

use pagetrail_core::{config::Config, rollup::HourlyActivityAggregate, PageTracker};
use pagetrail_duckdb::DuckDbBackend;
use tokio::sync::RwLock;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Internally uses `Arc<tokio::sync::Mutex<Connection>>`
    /// so it is already cheap to clone and async-safe.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Logger, reconstructor and aggregators bound to `db`, with the
    /// excluded identity and analytics window from `config` applied.
    pub tracker: PageTracker,

    /// Summary written by the most recent successful scheduler pass.
    pub last_rollup: RwLock<Option<HourlyActivityAggregate>>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given backend and config.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let db = Arc::new(db);
        let tracker = PageTracker::new(db.clone())
            .with_excluded_email(config.excluded_email.clone())
            .with_window(config.analytics_window);
        Self {
            db,
            config: Arc::new(config),
            tracker,
            last_rollup: RwLock::new(None),
        }
    }
}
