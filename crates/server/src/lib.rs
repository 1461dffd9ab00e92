//! logdeck-server
//!
//! HTTP gateway for logdeck: SSE log and event streaming from every
//! registered agent, plus the single-page application shell.

pub mod analytics;
pub mod api;
pub mod assets;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod routes;
pub mod stream;

pub use api::{ApiError, ServerError, ServerState};
pub use config::Config;
pub use routes::create_router;

pub use logdeck_core;
