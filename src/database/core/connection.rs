//! Database connection management
//!
//! This module provides the core SQLite connection wrapper used by the schema
//! manager and by every scoped session.

use anyhow::{Context, Result};
use rusqlite::trace::{TraceEvent, TraceEventCodes};
use rusqlite::Connection;
use std::time::Duration;
use tracing::debug;

/// Busy timeout applied when none is configured
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tracing target for echoed SQL statements
pub const SQL_ECHO_TARGET: &str = "ldf_research::sql";

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
///
/// Opening a file-backed connection never creates the parent directory. A
/// missing directory surfaces as the SQLite "unable to open database file"
/// error, which stays reachable through `anyhow::Error::downcast_ref`.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database with an explicit busy timeout
    pub fn open_with_timeout(path: Option<&str>, busy_timeout: Duration) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .with_context(|| format!("Failed to open database at '{}'", p))?,
            None => Connection::open_in_memory().context("Failed to create in-memory database")?,
        };

        let db = DatabaseConn { conn };
        db.configure(busy_timeout)?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self, busy_timeout: Duration) -> Result<()> {
        // must precede the journal mode switch, which needs an exclusive lock
        self.conn
            .busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;

        // WAL lets request handlers read while another session holds the write lock
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .context("Failed to set journal mode")?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .context("Failed to set synchronous mode")?;

        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .context("Failed to enable foreign keys")?;

        Ok(())
    }

    /// Log every statement run on this connection at debug level
    ///
    /// Statements are emitted under the [`SQL_ECHO_TARGET`] tracing target.
    pub fn enable_sql_echo(&self) {
        self.conn
            .trace_v2(TraceEventCodes::SQLITE_TRACE_STMT, Some(echo_statement));
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .with_context(|| format!("Failed to execute SQL: {}", sql.trim()))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        self.object_exists("table", table_name)
    }

    /// Check if an index exists in the database
    pub fn index_exists(&self, index_name: &str) -> Result<bool> {
        self.object_exists("index", index_name)
    }

    fn object_exists(&self, kind: &str, name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type=?1 AND name=?2",
                [kind, name],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to check {} existence", kind))?;
        Ok(count > 0)
    }
}

fn echo_statement(event: TraceEvent<'_>) {
    if let TraceEvent::Stmt(_, sql) = event {
        debug!(target: SQL_ECHO_TARGET, "{}", sql.trim());
    }
}
