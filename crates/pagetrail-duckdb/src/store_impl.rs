use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pagetrail_core::event::{NewPageEvent, PageDocument};
use pagetrail_core::rollup::HourlyActivityAggregate;
use pagetrail_core::store::{Collection, EventStore};

use crate::queries::{hourly, page_events};
use crate::DuckDbBackend;

#[async_trait]
impl EventStore for DuckDbBackend {
    async fn insert(&self, collection: &Collection, event: &NewPageEvent) -> anyhow::Result<()> {
        page_events::insert_event_inner(self, collection, event, Utc::now())
            .await
            .map(|_| ())
    }

    async fn recent(
        &self,
        collection: &Collection,
        limit: usize,
    ) -> anyhow::Result<Vec<PageDocument>> {
        page_events::recent_inner(self, collection, limit).await
    }

    async fn since(
        &self,
        collection: &Collection,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PageDocument>> {
        page_events::since_inner(self, collection, since).await
    }

    async fn upsert_hourly_activity(
        &self,
        aggregate: &HourlyActivityAggregate,
    ) -> anyhow::Result<()> {
        hourly::upsert_hourly_inner(self, aggregate).await
    }

    async fn hourly_activity(
        &self,
        hour_key: &str,
    ) -> anyhow::Result<Option<HourlyActivityAggregate>> {
        hourly::get_hourly_inner(self, hour_key).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        DuckDbBackend::ping(self).await
    }
}
