//! SQLite store for the orientation directory.
//!
//! The database holds both the content tables (schools and everything they
//! own) and the CMS bookkeeping tables that describe them. The CMS reads the
//! same file; this crate only writes schema, metadata, access rules and seed
//! rows.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

pub mod types;
pub use types::*;
pub(crate) use types::{new_id, now_rfc3339};

pub struct SchoolDb {
    conn: Connection,
}

impl SchoolDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    ///
    /// `BEGIN IMMEDIATE` takes the database write lock up front, so a second
    /// batch started against the same file waits (busy timeout) and then fails
    /// instead of interleaving its lookups with ours.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(E::from(DbError::Sqlite(e)));
                }
                Ok(val)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `path` and apply the schema.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(busy_timeout)?;
        Self::prepare(conn)
    }

    /// Open a private in-memory database with the full schema applied.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DbError> {
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        // FK enforcement is switched on after migrations: SQLite ignores the
        // pragma inside a transaction and every migration runs in one.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Number of rows in `table`. Only callable inside the crate, where table
    /// names are literals.
    pub(crate) fn count_rows(&self, table: &str) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Number of rows in `table` owned by `school_id` through `column`.
    pub(crate) fn count_owned_rows(
        &self,
        table: &str,
        column: &str,
        school_id: &str,
    ) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
            params![school_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub mod admins;
pub mod contacts;
pub mod events;
pub mod paths;
pub mod schools;
pub mod vocabulary;

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
