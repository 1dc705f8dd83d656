use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use pagetrail_core::rollup::{rollup_window, HourWindow, HourlyActivityAggregate};

use crate::state::AppState;

/// One scheduler pass: close out the previous hour, then refresh the hour in
/// progress.
///
/// The tick is not aligned to the clock, so a pass during hour `H` only sees
/// `H` up to that moment. Rewriting `H - 1` with its full bounds on the next
/// pass makes every completed hour final one tick after it ends.
pub async fn process_once(state: &Arc<AppState>) -> anyhow::Result<HourlyActivityAggregate> {
    let now = Utc::now();
    let current = HourWindow::containing(now, state.config.rollup_timezone);
    rollup_window(&*state.db, &current.previous(), now).await?;
    let aggregate = rollup_window(&*state.db, &current, now).await?;
    *state.last_rollup.write().await = Some(aggregate.clone());
    Ok(aggregate)
}

/// In-process replacement for an external cron entry. The first tick fires
/// immediately.
pub async fn run_rollup_loop(state: Arc<AppState>) {
    let tick = state.config.rollup_tick();
    info!(
        tick_seconds = tick.as_secs(),
        timezone = %state.config.rollup_timezone,
        "Hourly rollup scheduler started"
    );
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(err) = process_once(&state).await {
            error!(error = %err, "hourly rollup iteration failed");
        }
    }
}
