use anyhow::Result;
use chrono::{DateTime, Utc};

use pagetrail_core::event::{NewPageEvent, PageDocument};
use pagetrail_core::store::Collection;

use crate::backend::{format_ts, parse_ts};
use crate::DuckDbBackend;

const DOCUMENT_COLUMNS: &str = "id, user_id, previous_page, current_page, exit_page, session_id, \
     CAST(created_at AS VARCHAR), time_spent_on_page, user_email, is_exit";

/// Table backing a collection plus the owner filter for per-user collections.
fn table_for(collection: &Collection) -> (&'static str, Option<&str>) {
    match collection {
        Collection::UserPageViews(user_id) => ("user_page_views", Some(user_id.as_str())),
        Collection::GlobalPageNavigation => ("global_page_navigation", None),
    }
}

fn map_document(row: &duckdb::Row<'_>) -> duckdb::Result<PageDocument> {
    let created_at: Option<String> = row.get(6)?;
    Ok(PageDocument {
        id: row.get(0)?,
        user_id: row.get(1)?,
        previous_page: row.get(2)?,
        current_page: row.get(3)?,
        exit_page: row.get(4)?,
        session_id: row.get(5)?,
        timestamp: created_at.as_deref().and_then(parse_ts),
        time_spent_on_page: row.get(7)?,
        user_email: row.get(8)?,
        is_exit: row.get(9)?,
    })
}

pub(crate) async fn insert_event_inner(
    db: &DuckDbBackend,
    collection: &Collection,
    event: &NewPageEvent,
    created_at: DateTime<Utc>,
) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = format_ts(created_at);
    let time_spent = event
        .time_spent_on_page
        .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX));
    let conn = db.conn.lock().await;

    match table_for(collection) {
        (table, Some(owner_id)) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (\
                        id, owner_id, user_id, previous_page, current_page, exit_page, \
                        session_id, created_at, time_spent_on_page, user_email, is_exit\
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                duckdb::params![
                    id,
                    owner_id,
                    event.user_id,
                    event.previous_page,
                    event.current_page,
                    event.exit_page,
                    event.session_id,
                    created_at,
                    time_spent,
                    event.user_email,
                    event.is_exit,
                ],
            )?;
        }
        (table, None) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (\
                        id, user_id, previous_page, current_page, exit_page, \
                        session_id, created_at, time_spent_on_page, user_email, is_exit\
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                duckdb::params![
                    id,
                    event.user_id,
                    event.previous_page,
                    event.current_page,
                    event.exit_page,
                    event.session_id,
                    created_at,
                    time_spent,
                    event.user_email,
                    event.is_exit,
                ],
            )?;
        }
    }

    tracing::debug!(collection = %collection, id = %id, "Page event inserted");
    Ok(id)
}

/// Newest-first read of at most `limit` documents.
pub(crate) async fn recent_inner(
    db: &DuckDbBackend,
    collection: &Collection,
    limit: usize,
) -> Result<Vec<PageDocument>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let conn = db.conn.lock().await;
    let (table, owner) = table_for(collection);

    let docs = match owner {
        Some(owner_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                 WHERE owner_id = ?1 \
                 ORDER BY created_at DESC, seq DESC \
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(duckdb::params![owner_id, limit], map_document)?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                 ORDER BY created_at DESC, seq DESC \
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(duckdb::params![limit], map_document)?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        }
    };
    Ok(docs)
}

/// Every document with `created_at >= since`, newest first.
pub(crate) async fn since_inner(
    db: &DuckDbBackend,
    collection: &Collection,
    since: DateTime<Utc>,
) -> Result<Vec<PageDocument>> {
    let since = format_ts(since);
    let conn = db.conn.lock().await;
    let (table, owner) = table_for(collection);

    let docs = match owner {
        Some(owner_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                 WHERE owner_id = ?1 AND created_at >= CAST(?2 AS TIMESTAMP) \
                 ORDER BY created_at DESC, seq DESC"
            ))?;
            let rows = stmt.query_map(duckdb::params![owner_id, since], map_document)?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM {table} \
                 WHERE created_at >= CAST(?1 AS TIMESTAMP) \
                 ORDER BY created_at DESC, seq DESC"
            ))?;
            let rows = stmt.query_map(duckdb::params![since], map_document)?;
            rows.collect::<duckdb::Result<Vec<_>>>()?
        }
    };
    Ok(docs)
}

impl DuckDbBackend {
    /// Insert with an explicit timestamp instead of the current time.
    ///
    /// Used by fixtures that need a deterministic event order.
    pub async fn insert_at(
        &self,
        collection: &Collection,
        event: &NewPageEvent,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        insert_event_inner(self, collection, event, created_at).await
    }
}
