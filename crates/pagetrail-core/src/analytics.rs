//! Window aggregators over the global event collection.
//!
//! Each report is a single pass over a bounded, newest-first window of
//! events. Reports share nothing; every call re-folds its own window.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::event::PageEvent;

const TOP_PAGES: usize = 20;
const TOP_EXITS: usize = 20;
const TOP_TRANSITIONS: usize = 20;
const TOP_ENTRIES: usize = 20;
const TOP_EXIT_FLOWS: usize = 15;

/// Drops an operator's own traffic before any accumulation.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    excluded_email: Option<String>,
}

impl ExclusionFilter {
    pub fn new(excluded_email: Option<String>) -> Self {
        Self { excluded_email }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_excluded(&self, event: &PageEvent) -> bool {
        match (&self.excluded_email, &event.user_email) {
            (Some(excluded), Some(email)) => excluded == email,
            _ => false,
        }
    }

    fn admit<'a>(&'a self, events: &'a [PageEvent]) -> impl Iterator<Item = &'a PageEvent> + 'a {
        events.iter().filter(move |e| !self.is_excluded(e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostVisitedPage {
    pub page: String,
    pub visits: u64,
    pub unique_users: u64,
    /// Mean dwell time in ms across all visits, including zero-duration ones.
    pub avg_time_spent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPage {
    pub page: String,
    pub exits: u64,
    /// Share of all exits in the window, 0–100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StayTimeStat {
    pub page: String,
    pub avg_time_spent: f64,
    pub min_time_spent: u64,
    pub max_time_spent: u64,
    pub total_time_spent: u64,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
    pub page: String,
    /// Distinct users who entered on this page.
    pub users: u64,
    /// `users / total_entry_sessions * 100`. The numerator is deduplicated
    /// per user while the denominator counts every entry event.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitFlow {
    pub page: String,
    pub exit_page: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalysis {
    pub entry_pages: Vec<EntryPage>,
    pub exit_flows: Vec<ExitFlow>,
    pub total_entry_sessions: u64,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Descending by `primary`, then ascending by `key` so ties are stable
/// across runs regardless of hash order.
fn rank<T, K: Ord + ?Sized>(
    rows: &mut [T],
    primary: impl Fn(&T) -> f64,
    key: impl Fn(&T) -> &K,
) {
    rows.sort_by(|a, b| {
        primary(b)
            .partial_cmp(&primary(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| key(a).cmp(key(b)))
    });
}

#[derive(Default)]
struct PageAccumulator<'a> {
    visits: u64,
    users: HashSet<&'a str>,
    total_time: u64,
}

/// Pages ranked by visit count, top 20.
pub fn most_visited_pages(events: &[PageEvent], filter: &ExclusionFilter) -> Vec<MostVisitedPage> {
    let mut pages: HashMap<&str, PageAccumulator<'_>> = HashMap::new();
    for event in filter.admit(events) {
        let Some(page) = event.current_page.as_deref() else {
            continue;
        };
        let acc = pages.entry(page).or_default();
        acc.visits += 1;
        acc.users.insert(event.user_id.as_str());
        acc.total_time = acc
            .total_time
            .saturating_add(event.time_spent_on_page.unwrap_or(0));
    }

    let mut rows: Vec<MostVisitedPage> = pages
        .into_iter()
        .map(|(page, acc)| MostVisitedPage {
            page: page.to_string(),
            visits: acc.visits,
            unique_users: acc.users.len() as u64,
            avg_time_spent: acc.total_time as f64 / acc.visits as f64,
        })
        .collect();
    rank(&mut rows, |r| r.visits as f64, |r| r.page.as_str());
    rows.truncate(TOP_PAGES);
    rows
}

/// Distribution of exit pages, top 20.
pub fn exit_pages(events: &[PageEvent], filter: &ExclusionFilter) -> Vec<ExitPage> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut total_exits = 0u64;
    for event in filter.admit(events) {
        if let Some(page) = event.exit_page.as_deref() {
            *counts.entry(page).or_default() += 1;
            total_exits += 1;
        }
    }

    let mut rows: Vec<ExitPage> = counts
        .into_iter()
        .map(|(page, exits)| ExitPage {
            page: page.to_string(),
            exits,
            percentage: percent(exits, total_exits),
        })
        .collect();
    rank(&mut rows, |r| r.exits as f64, |r| r.page.as_str());
    rows.truncate(TOP_EXITS);
    rows
}

/// `previous_page -> current_page` edge counts, top 20.
pub fn page_transitions(events: &[PageEvent], filter: &ExclusionFilter) -> Vec<Transition> {
    let mut edges: HashMap<(&str, &str), u64> = HashMap::new();
    for event in filter.admit(events) {
        if let (Some(from), Some(to)) = (event.previous_page.as_deref(), event.current_page.as_deref())
        {
            *edges.entry((from, to)).or_default() += 1;
        }
    }

    let mut rows: Vec<Transition> = edges
        .into_iter()
        .map(|((from, to), count)| Transition {
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from.cmp(&b.from))
            .then_with(|| a.to.cmp(&b.to))
    });
    rows.truncate(TOP_TRANSITIONS);
    rows
}

/// Dwell-time statistics per page, highest average first.
///
/// Only events with a non-zero `time_spent_on_page` count, so a genuine
/// zero-millisecond visit is indistinguishable from a missing measurement.
pub fn stay_time_stats(events: &[PageEvent], filter: &ExclusionFilter) -> Vec<StayTimeStat> {
    let mut durations: HashMap<&str, Vec<u64>> = HashMap::new();
    for event in filter.admit(events) {
        match (event.current_page.as_deref(), event.time_spent_on_page) {
            (Some(page), Some(ms)) if ms > 0 => durations.entry(page).or_default().push(ms),
            _ => {}
        }
    }

    let mut rows: Vec<StayTimeStat> = durations
        .into_iter()
        .map(|(page, times)| {
            let total = times.iter().fold(0u64, |sum, ms| sum.saturating_add(*ms));
            StayTimeStat {
                page: page.to_string(),
                avg_time_spent: total as f64 / times.len() as f64,
                min_time_spent: times.iter().copied().min().unwrap_or(0),
                max_time_spent: times.iter().copied().max().unwrap_or(0),
                total_time_spent: total,
                visits: times.len() as u64,
            }
        })
        .collect();
    rank(&mut rows, |r| r.avg_time_spent, |r| r.page.as_str());
    rows
}

/// Where sessions start (entry pages) and which pages lead to exits.
pub fn funnel_analysis(events: &[PageEvent], filter: &ExclusionFilter) -> FunnelAnalysis {
    let mut entry_users: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut total_entry_sessions = 0u64;
    let mut flows: HashMap<(&str, &str), u64> = HashMap::new();

    for event in filter.admit(events) {
        let Some(page) = event.current_page.as_deref() else {
            continue;
        };
        if event.previous_page.is_none() {
            entry_users
                .entry(page)
                .or_default()
                .insert(event.user_id.as_str());
            total_entry_sessions += 1;
        }
        if let Some(exit) = event.exit_page.as_deref() {
            *flows.entry((page, exit)).or_default() += 1;
        }
    }

    let mut entry_pages: Vec<EntryPage> = entry_users
        .into_iter()
        .map(|(page, users)| EntryPage {
            page: page.to_string(),
            users: users.len() as u64,
            percentage: percent(users.len() as u64, total_entry_sessions),
        })
        .collect();
    rank(&mut entry_pages, |r| r.users as f64, |r| r.page.as_str());
    entry_pages.truncate(TOP_ENTRIES);

    let mut exit_flows: Vec<ExitFlow> = flows
        .into_iter()
        .map(|((page, exit_page), count)| ExitFlow {
            page: page.to_string(),
            exit_page: exit_page.to_string(),
            count,
        })
        .collect();
    exit_flows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.page.cmp(&b.page))
            .then_with(|| a.exit_page.cmp(&b.exit_page))
    });
    exit_flows.truncate(TOP_EXIT_FLOWS);

    FunnelAnalysis {
        entry_pages,
        exit_flows,
        total_entry_sessions,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn ev(user: &str, prev: Option<&str>, cur: Option<&str>, exit: Option<&str>) -> PageEvent {
        PageEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            previous_page: prev.map(str::to_string),
            current_page: cur.map(str::to_string),
            exit_page: exit.map(str::to_string),
            session_id: "s1".to_string(),
            timestamp: Utc::now(),
            time_spent_on_page: Some(0),
            user_email: None,
            is_exit: cur.is_none(),
        }
    }

    fn with_time(mut e: PageEvent, ms: Option<u64>) -> PageEvent {
        e.time_spent_on_page = ms;
        e
    }

    fn with_email(mut e: PageEvent, email: &str) -> PageEvent {
        e.user_email = Some(email.to_string());
        e
    }

    #[test]
    fn most_visited_counts_visits_users_and_average_dwell() {
        let events = vec![
            with_time(ev("u1", None, Some("/home"), None), Some(1000)),
            with_time(ev("u1", None, Some("/home"), None), Some(3000)),
            with_time(ev("u2", None, Some("/home"), None), Some(2000)),
            ev("u2", Some("/home"), Some("/pricing"), None),
            ev("u2", None, None, Some("/pricing")),
        ];
        let rows = most_visited_pages(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page, "/home");
        assert_eq!(rows[0].visits, 3);
        assert_eq!(rows[0].unique_users, 2);
        assert!((rows[0].avg_time_spent - 2000.0).abs() < f64::EPSILON);
        assert_eq!(rows[1].page, "/pricing");
    }

    #[test]
    fn most_visited_truncates_to_top_twenty() {
        let events: Vec<PageEvent> = (0..30)
            .map(|i| ev("u1", None, Some(&format!("/p{i:02}")), None))
            .collect();
        assert_eq!(most_visited_pages(&events, &ExclusionFilter::none()).len(), 20);
    }

    #[test]
    fn exit_pages_truncate_to_top_twenty() {
        let events: Vec<PageEvent> = (0..25)
            .map(|i| ev("u1", None, None, Some(&format!("/p{i:02}"))))
            .collect();
        let rows = exit_pages(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0].page, "/p00");
        // Percentages stay relative to every exit, not only the reported ones.
        assert!((rows[0].percentage - 4.0).abs() < 1e-9);
    }

    #[test]
    fn transitions_truncate_to_top_twenty() {
        let events: Vec<PageEvent> = (0..25)
            .map(|i| ev("u1", Some("/home"), Some(&format!("/p{i:02}")), None))
            .collect();
        let rows = page_transitions(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[19].to, "/p19");
    }

    #[test]
    fn entry_pages_truncate_to_top_twenty() {
        let events: Vec<PageEvent> = (0..25)
            .map(|i| ev(&format!("u{i}"), None, Some(&format!("/p{i:02}")), None))
            .collect();
        let funnel = funnel_analysis(&events, &ExclusionFilter::none());
        assert_eq!(funnel.entry_pages.len(), 20);
        assert_eq!(funnel.total_entry_sessions, 25);
    }

    #[test]
    fn exit_flows_truncate_to_top_fifteen() {
        let events: Vec<PageEvent> = (0..20)
            .map(|i| ev("u1", Some("/home"), Some("/checkout"), Some(&format!("/p{i:02}"))))
            .collect();
        let funnel = funnel_analysis(&events, &ExclusionFilter::none());
        assert_eq!(funnel.exit_flows.len(), 15);
        assert_eq!(funnel.exit_flows[14].exit_page, "/p14");
    }

    #[test]
    fn huge_dwell_times_saturate_instead_of_overflowing() {
        let big = Some(i64::MAX as u64);
        let events = vec![
            with_time(ev("u1", None, Some("/video"), None), big),
            with_time(ev("u2", None, Some("/video"), None), big),
            with_time(ev("u3", None, Some("/video"), None), big),
        ];
        let stay = stay_time_stats(&events, &ExclusionFilter::none());
        assert_eq!(stay[0].total_time_spent, u64::MAX);
        assert_eq!(stay[0].visits, 3);

        let pages = most_visited_pages(&events, &ExclusionFilter::none());
        assert_eq!(pages[0].visits, 3);
        assert!(pages[0].avg_time_spent > 0.0);
    }

    #[test]
    fn exit_distribution_reports_share_of_all_exits() {
        let events = vec![
            ev("u1", None, None, Some("A")),
            ev("u2", None, None, Some("A")),
            ev("u3", None, None, Some("B")),
            ev("u3", None, Some("/home"), None),
        ];
        let rows = exit_pages(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].page.as_str(), rows[0].exits), ("A", 2));
        assert!((rows[0].percentage - 66.7).abs() < 0.05);
        assert_eq!((rows[1].page.as_str(), rows[1].exits), ("B", 1));
        assert!((rows[1].percentage - 33.3).abs() < 0.05);
    }

    #[test]
    fn transitions_count_page_pairs() {
        let events = vec![
            ev("u1", Some("/a"), Some("/b"), None),
            ev("u2", Some("/a"), Some("/b"), None),
            ev("u1", Some("/a"), Some("/c"), None),
            ev("u1", None, Some("/a"), None),
        ];
        let rows = page_transitions(&events, &ExclusionFilter::none());
        assert_eq!(
            rows,
            vec![
                Transition {
                    from: "/a".to_string(),
                    to: "/b".to_string(),
                    count: 2
                },
                Transition {
                    from: "/a".to_string(),
                    to: "/c".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn transitions_keep_pages_containing_arrow_intact() {
        let events = vec![ev("u1", Some("/x -> y"), Some("/z"), None)];
        let rows = page_transitions(&events, &ExclusionFilter::none());
        assert_eq!(rows[0].from, "/x -> y");
        assert_eq!(rows[0].to, "/z");
    }

    #[test]
    fn stay_time_ignores_zero_and_missing_durations() {
        let events = vec![
            with_time(ev("u1", None, Some("/docs"), None), Some(0)),
            with_time(ev("u2", None, Some("/docs"), None), Some(5000)),
            with_time(ev("u3", None, Some("/docs"), None), None),
        ];
        let rows = stay_time_stats(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].visits, 1);
        assert!((rows[0].avg_time_spent - 5000.0).abs() < f64::EPSILON);
        assert_eq!(rows[0].min_time_spent, 5000);
        assert_eq!(rows[0].max_time_spent, 5000);
        assert_eq!(rows[0].total_time_spent, 5000);
    }

    #[test]
    fn stay_time_sorted_by_average_without_truncation() {
        let events: Vec<PageEvent> = (1..=25)
            .map(|i| with_time(ev("u1", None, Some(&format!("/p{i}")), None), Some(i * 100)))
            .collect();
        let rows = stay_time_stats(&events, &ExclusionFilter::none());
        assert_eq!(rows.len(), 25);
        assert_eq!(rows[0].page, "/p25");
        assert_eq!(rows[24].page, "/p1");
    }

    #[test]
    fn entries_only_count_events_without_previous_page() {
        let events = vec![
            ev("u1", None, Some("/home"), None),
            ev("u1", Some("/home"), Some("/pricing"), None),
        ];
        let funnel = funnel_analysis(&events, &ExclusionFilter::none());
        assert_eq!(funnel.total_entry_sessions, 1);
        assert_eq!(funnel.entry_pages.len(), 1);
        assert_eq!(funnel.entry_pages[0].page, "/home");
    }

    #[test]
    fn entry_percentage_mixes_unique_users_with_raw_sessions() {
        let events = vec![
            ev("u1", None, Some("/home"), None),
            ev("u1", None, Some("/home"), None),
            ev("u2", None, Some("/blog"), None),
        ];
        let funnel = funnel_analysis(&events, &ExclusionFilter::none());
        assert_eq!(funnel.total_entry_sessions, 3);
        let home = funnel
            .entry_pages
            .iter()
            .find(|e| e.page == "/home")
            .expect("home entry");
        assert_eq!(home.users, 1);
        assert!((home.percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn exit_flows_pair_current_and_exit_pages() {
        let events = vec![
            ev("u1", Some("/a"), Some("/pricing"), Some("/pricing")),
            ev("u2", Some("/a"), Some("/pricing"), Some("/pricing")),
            ev("u3", None, None, Some("/pricing")),
        ];
        let funnel = funnel_analysis(&events, &ExclusionFilter::none());
        assert_eq!(funnel.exit_flows.len(), 1);
        assert_eq!(funnel.exit_flows[0].count, 2);
        assert_eq!(funnel.exit_flows[0].page, "/pricing");
    }

    #[test]
    fn excluded_identity_is_dropped_from_every_report() {
        let admin = "admin@example.com";
        let events = vec![
            with_time(with_email(ev("admin", None, Some("/secret"), None), admin), Some(900)),
            with_email(ev("admin", Some("/secret"), Some("/admin"), None), admin),
            with_email(ev("admin", None, None, Some("/admin")), admin),
            with_time(ev("u1", None, Some("/home"), None), Some(100)),
        ];
        let filter = ExclusionFilter::new(Some(admin.to_string()));

        let pages = most_visited_pages(&events, &filter);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, "/home");
        assert!(exit_pages(&events, &filter).is_empty());
        assert!(page_transitions(&events, &filter).is_empty());
        let stay = stay_time_stats(&events, &filter);
        assert_eq!(stay.len(), 1);
        assert_eq!(stay[0].page, "/home");
        let funnel = funnel_analysis(&events, &filter);
        assert_eq!(funnel.total_entry_sessions, 1);
        assert_eq!(funnel.entry_pages[0].page, "/home");
    }
}
