pub mod hourly;
pub mod page_events;
