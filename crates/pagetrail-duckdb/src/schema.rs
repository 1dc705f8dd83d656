/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `PAGETRAIL_DUCKDB_MEMORY`, default `"1GB"`). Always set it
/// explicitly: the DuckDB default of 80% of system RAM is not acceptable for
/// a server process.
///
/// The two event tables mirror the document collections
/// `users/{userId}/pageViews` and `globalPageNavigation`. Document fields are
/// deliberately nullable: the tables stand in for a schemaless store, and
/// malformed rows are rejected when read, not when written.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- Shared insertion counter. Breaks ordering ties between events that
-- received the same timestamp.
CREATE SEQUENCE IF NOT EXISTS page_event_seq START 1;

-- ===========================================
-- users/{{userId}}/pageViews
-- ===========================================
CREATE TABLE IF NOT EXISTS user_page_views (
    seq                 BIGINT NOT NULL DEFAULT nextval('page_event_seq'),
    id                  VARCHAR PRIMARY KEY,       -- UUID v4 document id
    owner_id            VARCHAR NOT NULL,          -- {{userId}} path segment
    user_id             VARCHAR,
    previous_page       VARCHAR,
    current_page        VARCHAR,                   -- NULL on exit records
    exit_page           VARCHAR,
    session_id          VARCHAR,
    created_at          TIMESTAMP,                 -- server-assigned, UTC
    time_spent_on_page  BIGINT,                    -- milliseconds
    user_email          VARCHAR,
    is_exit             BOOLEAN
);
CREATE INDEX IF NOT EXISTS idx_user_page_views_owner_time
    ON user_page_views(owner_id, created_at DESC);

-- ===========================================
-- globalPageNavigation
-- ===========================================
CREATE TABLE IF NOT EXISTS global_page_navigation (
    seq                 BIGINT NOT NULL DEFAULT nextval('page_event_seq'),
    id                  VARCHAR PRIMARY KEY,
    user_id             VARCHAR,
    previous_page       VARCHAR,
    current_page        VARCHAR,
    exit_page           VARCHAR,
    session_id          VARCHAR,
    created_at          TIMESTAMP,
    time_spent_on_page  BIGINT,
    user_email          VARCHAR,
    is_exit             BOOLEAN
);
-- Every aggregator and the hourly rollup read newest-first windows.
CREATE INDEX IF NOT EXISTS idx_global_page_navigation_time
    ON global_page_navigation(created_at DESC);

-- ===========================================
-- aggregates/activity/hourly/{{hourKey}}
-- ===========================================
CREATE TABLE IF NOT EXISTS hourly_activity (
    hour_key        VARCHAR PRIMARY KEY,           -- 'YYYY-MM-DD-HH'
    events          BIGINT NOT NULL,
    unique_users    BIGINT NOT NULL,
    updated_at      TIMESTAMP NOT NULL
);
"#
    )
}
