//! rsv-api: HTTP API for the recurring reservation gateway
//!
//! Exposes preview, commit and series management over REST.
//! Built with axum for async HTTP handling.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{start_server, AppState};
