//! KOI vetting HTTP server
//!
//! Serves predictions from a trained artifact bundle and records them in a
//! prediction log.

pub mod api;
pub mod config;

pub use api::{create_router, serve, AppState};
pub use config::ServerConfig;
