pub mod activity;
pub mod analytics;
pub mod health;
pub mod navigation;
pub mod users;
