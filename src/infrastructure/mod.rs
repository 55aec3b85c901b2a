// Infrastructure layer - External dependencies and adapters
pub mod chunked_stream;
pub mod config;
pub mod demo_auth;
pub mod frame_driver;
pub mod http_response;
pub mod preferences;
pub mod remote_source;
pub mod simulated_source;
pub mod svg_surface;
pub mod tokio_scheduler;
