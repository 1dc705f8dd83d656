use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::PageEvent;

/// One entry of a user's visit history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVisit {
    pub current_page: Option<String>,
    pub previous_page: Option<String>,
    pub exit_page: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub time_spent_on_page: Option<u64>,
    pub is_exit: bool,
}

impl From<&PageEvent> for PageVisit {
    fn from(event: &PageEvent) -> Self {
        Self {
            current_page: event.current_page.clone(),
            previous_page: event.previous_page.clone(),
            exit_page: event.exit_page.clone(),
            session_id: event.session_id.clone(),
            timestamp: event.timestamp,
            time_spent_on_page: event.time_spent_on_page,
            is_exit: event.is_exit,
        }
    }
}

/// Navigation state of one user, rebuilt from a scan on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPageNavigation {
    pub user_id: String,
    pub visits: Vec<PageVisit>,
    pub current_page: Option<String>,
    pub previous_page: Option<String>,
    pub last_exit_page: Option<String>,
    pub session_id: Option<String>,
}

impl UserPageNavigation {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            visits: Vec::new(),
            current_page: None,
            previous_page: None,
            last_exit_page: None,
            session_id: None,
        }
    }

    fn apply(&mut self, event: &PageEvent) {
        // An exit-only record must not clear the last known current page.
        if let Some(current) = &event.current_page {
            self.current_page = Some(current.clone());
            self.previous_page = event.previous_page.clone();
        }
        if let Some(exit) = &event.exit_page {
            self.last_exit_page = Some(exit.clone());
        }
        self.session_id = Some(event.session_id.clone());
        self.visits.push(PageVisit::from(event));
    }
}

/// Fold a scan of the global collection into per-user navigation state.
///
/// Events are applied strictly in delivery order. Scans are newest-first, so
/// the "current" fields end up holding the most recently *scanned* event for
/// each user, which is the oldest one in the window rather than the latest
/// by timestamp. Callers that need latest-by-time must reverse the scan first.
pub fn fold_user_navigation(events: &[PageEvent]) -> BTreeMap<String, UserPageNavigation> {
    let mut users: BTreeMap<String, UserPageNavigation> = BTreeMap::new();
    for event in events {
        users
            .entry(event.user_id.clone())
            .or_insert_with(|| UserPageNavigation::new(&event.user_id))
            .apply(event);
    }
    users
}

/// Re-sort a user's events newest first. The sort is stable so events with
/// equal timestamps keep the store's order.
pub fn sort_journey(mut events: Vec<PageEvent>) -> Vec<PageEvent> {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

/// `current_page` of the newest event, falling back to its `exit_page`.
pub fn last_page(events: &[PageEvent]) -> Option<String> {
    events.first().and_then(|e| e.page()).map(str::to_string)
}
