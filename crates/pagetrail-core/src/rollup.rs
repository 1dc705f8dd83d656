//! Hourly activity rollup.
//!
//! Counts events and distinct users inside one hour and overwrites one
//! summary document per hour. Reruns for the same hour
//! recompute from scratch, so a failed or overlapping run is safe to repeat.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CoreError;
use crate::event::{validate_documents, PageEvent};
use crate::store::{hourly_activity_path, Collection, EventStore};

/// Timezone the hour boundary is computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollupTimezone {
    /// The server's local time.
    #[default]
    Local,
    Named(Tz),
}

impl RollupTimezone {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| CoreError::InvalidTimezone(trimmed.to_string()))
    }
}

impl fmt::Display for RollupTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// The hour an instant falls in: its `YYYY-MM-DD-HH` key and UTC bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourWindow {
    pub key: String,
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    tz: RollupTimezone,
}

impl HourWindow {
    pub fn containing(now: DateTime<Utc>, tz: RollupTimezone) -> Self {
        match tz {
            RollupTimezone::Local => window_in(now, &Local, tz),
            RollupTimezone::Named(zone) => window_in(now, &zone, tz),
        }
    }

    /// The hour that ended when this one started.
    pub fn previous(&self) -> Self {
        Self::containing(self.start - chrono::Duration::nanoseconds(1), self.tz)
    }
}

fn window_in<Z: TimeZone>(now: DateTime<Utc>, zone: &Z, tz: RollupTimezone) -> HourWindow {
    let local = now.with_timezone(zone).naive_local();
    // Subtract the local minutes/seconds from the instant itself so DST
    // overlaps resolve to the hour actually in progress.
    let into_hour = chrono::Duration::seconds(i64::from(local.minute() * 60 + local.second()))
        + chrono::Duration::nanoseconds(i64::from(local.nanosecond() % 1_000_000_000));
    let start = now - into_hour;
    HourWindow {
        key: local.format("%Y-%m-%d-%H").to_string(),
        start,
        end: start + chrono::Duration::hours(1),
        tz,
    }
}

/// Check that `key` is a zero-padded `YYYY-MM-DD-HH` hour key.
pub fn validate_hour_key(key: &str) -> Result<(), CoreError> {
    let invalid = || CoreError::InvalidHourKey(key.to_string());
    if key.len() != 13 {
        return Err(invalid());
    }
    NaiveDateTime::parse_from_str(&format!("{key}:00"), "%Y-%m-%d-%H:%M")
        .map(|_| ())
        .map_err(|_| invalid())
}

/// Persisted summary stored at `aggregates/activity/hourly/{hourKey}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyActivityAggregate {
    pub hour_key: String,
    pub events: u64,
    pub unique_users: u64,
    pub updated_at: DateTime<Utc>,
}

impl HourlyActivityAggregate {
    pub fn path(&self) -> String {
        hourly_activity_path(&self.hour_key)
    }
}

/// Fold the hour's events into a summary.
pub fn summarize_hour(
    hour_key: &str,
    events: &[PageEvent],
    updated_at: DateTime<Utc>,
) -> HourlyActivityAggregate {
    let users: HashSet<&str> = events.iter().map(|e| e.user_id.as_str()).collect();
    HourlyActivityAggregate {
        hour_key: hour_key.to_string(),
        events: events.len() as u64,
        unique_users: users.len() as u64,
        updated_at,
    }
}

/// Run one rollup for the hour containing `now`.
///
/// Errors propagate to the caller; the job binary turns them into a
/// non-zero exit code and the scheduler logs them.
pub async fn run_hourly_rollup(
    store: &dyn EventStore,
    now: DateTime<Utc>,
    tz: RollupTimezone,
) -> anyhow::Result<HourlyActivityAggregate> {
    rollup_window(store, &HourWindow::containing(now, tz), now).await
}

/// Recompute and overwrite the summary for `window`, counting events in
/// `[window.start, window.end)`.
pub async fn rollup_window(
    store: &dyn EventStore,
    window: &HourWindow,
    now: DateTime<Utc>,
) -> anyhow::Result<HourlyActivityAggregate> {
    let docs = store
        .since(&Collection::GlobalPageNavigation, window.start)
        .await?;
    let validated = validate_documents(docs);
    if validated.quarantined > 0 {
        tracing::warn!(
            quarantined = validated.quarantined,
            hour_key = %window.key,
            "Malformed events excluded from hourly rollup"
        );
    }
    let in_hour: Vec<PageEvent> = validated
        .events
        .into_iter()
        .filter(|e| e.timestamp < window.end)
        .collect();

    let aggregate = summarize_hour(&window.key, &in_hour, now);
    store.upsert_hourly_activity(&aggregate).await?;
    info!(
        path = %aggregate.path(),
        events = aggregate.events,
        unique_users = aggregate.unique_users,
        timezone = %window.tz,
        "Hourly activity rollup written"
    );
    Ok(aggregate)
}
