pub mod analytics;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod navigation;
pub mod rollup;
pub mod store;
pub mod tracker;

pub use store::{Collection, EventStore};
pub use tracker::PageTracker;
