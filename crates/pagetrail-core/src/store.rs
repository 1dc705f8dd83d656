//! Event store abstraction.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::event::{NewPageEvent, PageDocument};
use crate::rollup::HourlyActivityAggregate;

/// One of the two append-only collections every page event is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    /// `users/{userId}/pageViews`
    UserPageViews(String),
    /// `globalPageNavigation`
    GlobalPageNavigation,
}

impl Collection {
    pub fn user(user_id: &str) -> Self {
        Self::UserPageViews(user_id.to_string())
    }

    /// Document path of the collection, e.g. `users/u1/pageViews`.
    pub fn path(&self) -> String {
        match self {
            Self::UserPageViews(user_id) => format!("users/{user_id}/pageViews"),
            Self::GlobalPageNavigation => "globalPageNavigation".to_string(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Document path of an hourly summary: `aggregates/activity/hourly/{hourKey}`.
pub fn hourly_activity_path(hour_key: &str) -> String {
    format!("aggregates/activity/hourly/{hour_key}")
}

/// The document store the tracker and rollup job run against.
///
/// Reads return raw [`PageDocument`]s; validation happens in
/// [`crate::event::validate_documents`], not in the store.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Append one record. The store assigns the document id and timestamp.
    async fn insert(&self, collection: &Collection, event: &NewPageEvent) -> anyhow::Result<()>;

    /// At most `limit` documents, newest first. Equal timestamps keep the
    /// later insert first.
    async fn recent(&self, collection: &Collection, limit: usize)
        -> anyhow::Result<Vec<PageDocument>>;

    /// Every document with `timestamp >= since`, newest first.
    async fn since(
        &self,
        collection: &Collection,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PageDocument>>;

    /// Write the summary under its hour key, replacing any previous document.
    async fn upsert_hourly_activity(&self, aggregate: &HourlyActivityAggregate)
        -> anyhow::Result<()>;

    async fn hourly_activity(&self, hour_key: &str)
        -> anyhow::Result<Option<HourlyActivityAggregate>>;

    /// Lightweight liveness check.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_paths_match_document_layout() {
        assert_eq!(Collection::user("u1").path(), "users/u1/pageViews");
        assert_eq!(
            Collection::GlobalPageNavigation.to_string(),
            "globalPageNavigation"
        );
        assert_eq!(
            hourly_activity_path("2026-10-18-09"),
            "aggregates/activity/hourly/2026-10-18-09"
        );
    }
}
