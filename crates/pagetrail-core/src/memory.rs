//! In-memory [`EventStore`] used by tests and local tooling.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::event::{NewPageEvent, PageDocument};
use crate::rollup::HourlyActivityAggregate;
use crate::store::{Collection, EventStore};

#[derive(Default)]
struct Inner {
    next_seq: u64,
    documents: Vec<(u64, Collection, PageDocument)>,
    hourly: HashMap<String, HourlyActivityAggregate>,
}

/// A process-local document store with the same ordering rules as the
/// DuckDB backend: newest timestamp first, later insert first on ties.
#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit timestamp instead of the current time.
    pub async fn insert_at(
        &self,
        collection: &Collection,
        event: &NewPageEvent,
        timestamp: DateTime<Utc>,
    ) {
        let doc: PageDocument = event
            .clone()
            .into_stored(uuid::Uuid::new_v4().to_string(), timestamp)
            .into();
        self.insert_document(collection, doc).await;
    }

    /// Insert a raw document as-is, bypassing the typed write path.
    pub async fn insert_document(&self, collection: &Collection, doc: PageDocument) {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.documents.push((seq, collection.clone(), doc));
    }

    pub async fn hourly_document_count(&self) -> usize {
        self.inner.lock().await.hourly.len()
    }

    async fn scan<F>(&self, collection: &Collection, keep: F) -> Vec<PageDocument>
    where
        F: Fn(&PageDocument) -> bool,
    {
        let inner = self.inner.lock().await;
        let mut matched: Vec<&(u64, Collection, PageDocument)> = inner
            .documents
            .iter()
            .filter(|(_, c, doc)| c == collection && keep(doc))
            .collect();
        matched.sort_by(|a, b| b.2.timestamp.cmp(&a.2.timestamp).then(b.0.cmp(&a.0)));
        matched.into_iter().map(|(_, _, doc)| doc.clone()).collect()
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert(&self, collection: &Collection, event: &NewPageEvent) -> anyhow::Result<()> {
        self.insert_at(collection, event, Utc::now()).await;
        Ok(())
    }

    async fn recent(
        &self,
        collection: &Collection,
        limit: usize,
    ) -> anyhow::Result<Vec<PageDocument>> {
        let mut docs = self.scan(collection, |_| true).await;
        docs.truncate(limit);
        Ok(docs)
    }

    async fn since(
        &self,
        collection: &Collection,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PageDocument>> {
        Ok(self
            .scan(collection, |doc| doc.timestamp.is_some_and(|ts| ts >= since))
            .await)
    }

    async fn upsert_hourly_activity(
        &self,
        aggregate: &HourlyActivityAggregate,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .hourly
            .insert(aggregate.hour_key.clone(), aggregate.clone());
        Ok(())
    }

    async fn hourly_activity(
        &self,
        hour_key: &str,
    ) -> anyhow::Result<Option<HourlyActivityAggregate>> {
        Ok(self.inner.lock().await.hourly.get(hour_key).cloned())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
