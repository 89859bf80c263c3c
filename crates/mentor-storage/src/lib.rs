//! Mentor storage crate - SQLite persistence behind a bounded connection pool.
//!
//! Provides the pooled database with migrations, repositories for owners,
//! sessions and task records, and the SQLite-backed session history store.

pub mod db;
pub mod history;
pub mod migrations;
pub mod repository;
pub mod tasks;

pub use db::Database;
pub use history::SqliteHistoryStore;
pub use repository::{OwnerCredentials, OwnerRepository, SessionRepository};
pub use tasks::{TaskRepository, TaskRow};
