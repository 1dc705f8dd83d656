//! Page-navigation tracking service.
//!
//! [`PageTracker`] binds the logger, the navigation reconstructor and the
//! window aggregators to one injected [`EventStore`]. Tracking must never
//! break the page that calls it, so every store failure is logged and turned
//! into an empty result here; nothing below this layer swallows errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, warn};

use crate::analytics::{
    self, ExclusionFilter, ExitPage, FunnelAnalysis, MostVisitedPage, StayTimeStat, Transition,
};
use crate::config::DEFAULT_ANALYTICS_WINDOW;
use crate::event::{validate_documents, NewPageEvent, PageEvent};
use crate::navigation::{self, UserPageNavigation};
use crate::store::{Collection, EventStore};

/// Multiplier applied to the per-user limit when scanning the global
/// collection for every user's navigation.
const ALL_USERS_SCAN_FACTOR: usize = 10;

#[derive(Clone)]
pub struct PageTracker {
    store: Arc<dyn EventStore>,
    exclusion: ExclusionFilter,
    window: usize,
}

impl PageTracker {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            exclusion: ExclusionFilter::none(),
            window: DEFAULT_ANALYTICS_WINDOW,
        }
    }

    pub fn with_excluded_email(mut self, email: Option<String>) -> Self {
        self.exclusion = ExclusionFilter::new(email);
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    // ---------------------------------------------------------------
    // Event logger
    // ---------------------------------------------------------------

    /// Record a navigation to `current_page` in both collections.
    pub async fn log_page_view(
        &self,
        user_id: &str,
        current_page: &str,
        previous_page: Option<&str>,
        session_id: &str,
        user_email: Option<&str>,
    ) {
        let event =
            NewPageEvent::page_view(user_id, current_page, previous_page, session_id, user_email);
        self.dual_write(&event).await;
    }

    /// Record leaving `exit_page` after `time_spent_on_page` ms in both collections.
    pub async fn log_page_exit(
        &self,
        user_id: &str,
        exit_page: &str,
        session_id: &str,
        time_spent_on_page: u64,
        user_email: Option<&str>,
    ) {
        let event =
            NewPageEvent::page_exit(user_id, exit_page, session_id, time_spent_on_page, user_email);
        self.dual_write(&event).await;
    }

    /// Two independent writes. A failure in the first does not stop the
    /// second, so the per-user and global views can diverge.
    async fn dual_write(&self, event: &NewPageEvent) {
        for collection in [
            Collection::user(&event.user_id),
            Collection::GlobalPageNavigation,
        ] {
            if let Err(e) = self.store.insert(&collection, event).await {
                error!(
                    collection = %collection,
                    user_id = %event.user_id,
                    is_exit = event.is_exit,
                    error = %e,
                    "Failed to log page event"
                );
            }
        }
    }

    // ---------------------------------------------------------------
    // Navigation reconstructor
    // ---------------------------------------------------------------

    async fn scan(&self, collection: &Collection, limit: usize) -> Vec<PageEvent> {
        match self.store.recent(collection, limit).await {
            Ok(docs) => {
                let validated = validate_documents(docs);
                if validated.quarantined > 0 {
                    warn!(
                        collection = %collection,
                        quarantined = validated.quarantined,
                        "Skipped malformed page events"
                    );
                }
                validated.events
            }
            Err(e) => {
                error!(collection = %collection, limit, error = %e, "Page event scan failed");
                Vec::new()
            }
        }
    }

    /// The user's most recent `limit` events, newest first.
    pub async fn get_user_page_navigation(&self, user_id: &str, limit: usize) -> Vec<PageEvent> {
        self.scan(&Collection::user(user_id), limit).await
    }

    /// `current_page` (or `exit_page`) of the user's newest event.
    pub async fn get_user_last_page(&self, user_id: &str) -> Option<String> {
        let events = self.scan(&Collection::user(user_id), 1).await;
        navigation::last_page(&events)
    }

    /// Navigation state of every user seen in the most recent `limit * 10`
    /// global events. See [`navigation::fold_user_navigation`] for the
    /// ordering caveat on the "current" fields.
    pub async fn get_all_users_page_navigation(
        &self,
        limit: usize,
    ) -> BTreeMap<String, UserPageNavigation> {
        let scan_size = limit.saturating_mul(ALL_USERS_SCAN_FACTOR);
        let events = self.scan(&Collection::GlobalPageNavigation, scan_size).await;
        navigation::fold_user_navigation(&events)
    }

    /// Per-user fetch re-sorted newest first, tolerating store ordering drift.
    pub async fn get_user_navigation_journey(&self, user_id: &str, limit: usize) -> Vec<PageEvent> {
        let events = self.scan(&Collection::user(user_id), limit).await;
        navigation::sort_journey(events)
    }

    // ---------------------------------------------------------------
    // Aggregators
    // ---------------------------------------------------------------

    async fn analytics_window(&self, window: Option<usize>) -> Vec<PageEvent> {
        let size = window.unwrap_or(self.window).max(1);
        self.scan(&Collection::GlobalPageNavigation, size).await
    }

    pub async fn get_most_visited_pages(&self, window: Option<usize>) -> Vec<MostVisitedPage> {
        let events = self.analytics_window(window).await;
        analytics::most_visited_pages(&events, &self.exclusion)
    }

    pub async fn get_exit_pages(&self, window: Option<usize>) -> Vec<ExitPage> {
        let events = self.analytics_window(window).await;
        analytics::exit_pages(&events, &self.exclusion)
    }

    pub async fn get_page_transitions(&self, window: Option<usize>) -> Vec<Transition> {
        let events = self.analytics_window(window).await;
        analytics::page_transitions(&events, &self.exclusion)
    }

    pub async fn get_stay_time_stats(&self, window: Option<usize>) -> Vec<StayTimeStat> {
        let events = self.analytics_window(window).await;
        analytics::stay_time_stats(&events, &self.exclusion)
    }

    pub async fn get_funnel_analysis(&self, window: Option<usize>) -> FunnelAnalysis {
        let events = self.analytics_window(window).await;
        analytics::funnel_analysis(&events, &self.exclusion)
    }
}
