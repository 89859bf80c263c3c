//! Database connection management.
//!
//! Hands out rusqlite connections from a bounded r2d2 pool. Each connection
//! enables foreign keys (turns cascade with their session) and a busy
//! timeout; the database itself runs in WAL mode.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction};
use tracing::info;

use mentor_core::config::{expand_home, DatabaseConfig};
use mentor_core::error::{MentorError, Result};

use crate::migrations;

/// Pooled SQLite database.
///
/// Connections are checked out for a single read or write and returned to
/// the pool immediately afterwards.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (or create) the database described by `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::new(
            &expand_home(&config.path),
            config.pool_size,
            config.busy_timeout_ms,
        )
    }

    /// Open (or create) a database file with a pool of `pool_size` connections.
    ///
    /// Configures WAL mode and runs all pending migrations.
    pub fn new(path: &Path, pool_size: u32, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| init_connection(conn, busy_timeout_ms));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| MentorError::Storage(format!("Failed to open database: {}", e)))?;

        let db = Self { pool };
        db.with_conn(|conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
                .map_err(|e| MentorError::Storage(format!("Failed to set WAL mode: {}", e)))
        })?;

        info!(path = %path.display(), pool_size, "Database opened");

        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// every in-memory connection is its own database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| init_connection(conn, 5000));
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)
            .map_err(|e| MentorError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self { pool };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a pooled connection.
    ///
    /// The connection is held for the duration of the closure only. Do not
    /// call back into the database from inside `f`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.checkout()?;
        f(&conn)
    }

    /// Execute a closure inside a transaction, committing when it returns `Ok`.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.checkout()?;
        let tx = conn
            .transaction()
            .map_err(|e| MentorError::Storage(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| MentorError::Storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(value)
    }

    /// Connections currently open (idle or checked out).
    pub fn pool_connections(&self) -> u32 {
        self.pool.state().connections
    }

    fn checkout(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| MentorError::Storage(format!("Connection pool unavailable: {}", e)))
    }
}

fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}
