pub mod animator;
pub mod auth;
pub mod chart_renderer;
pub mod dashboard;
pub mod data_source;
pub mod live_feed;
pub mod preferences;
pub mod scheduler;
