//! HTTP surface for the reading assistant.
//!
//! Accounts and bearer tokens, analysis sessions, follow-up questions and
//! task status polling, served by axum.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
