use anyhow::{anyhow, Result};

use pagetrail_core::rollup::HourlyActivityAggregate;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

/// Write the summary under its hour key. A rerun for the same hour replaces
/// the previous counts instead of adding to them.
pub(crate) async fn upsert_hourly_inner(
    db: &DuckDbBackend,
    aggregate: &HourlyActivityAggregate,
) -> Result<()> {
    let conn = db.conn.lock().await;
    conn.execute(
        r#"INSERT INTO hourly_activity (hour_key, events, unique_users, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (hour_key) DO UPDATE SET
               events = EXCLUDED.events,
               unique_users = EXCLUDED.unique_users,
               updated_at = EXCLUDED.updated_at"#,
        duckdb::params![
            aggregate.hour_key,
            aggregate.events as i64,
            aggregate.unique_users as i64,
            format_ts(aggregate.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) async fn get_hourly_inner(
    db: &DuckDbBackend,
    hour_key: &str,
) -> Result<Option<HourlyActivityAggregate>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT events, unique_users, CAST(updated_at AS VARCHAR) \
         FROM hourly_activity WHERE hour_key = ?1",
    )?;
    let mut rows = stmt.query(duckdb::params![hour_key])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let events: i64 = row.get(0)?;
    let unique_users: i64 = row.get(1)?;
    let updated_at: String = row.get(2)?;
    let updated_at = parse_ts(&updated_at)
        .ok_or_else(|| anyhow!("invalid updated_at for hour {hour_key}: {updated_at}"))?;

    Ok(Some(HourlyActivityAggregate {
        hour_key: hour_key.to_string(),
        events: events.max(0) as u64,
        unique_users: unique_users.max(0) as u64,
        updated_at,
    }))
}
