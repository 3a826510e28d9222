//! Database module
//!
//! This module provides all database functionality, organized into:
//!
//! - **core**: SQLite connection wrapper and schema management
//! - **research**: the research database handle, record types and repositories
//! - **session**: scoped unit-of-work sessions
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # Table definitions and SchemaManager
//! │
//! ├── research/       # Persistent storage
//! │   ├── telemetry   # TelemetryLog records
//! │   └── acts        # ActMetadata records
//! │
//! └── session/        # One connection + transaction per unit of work
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ldf_research::database::{ResearchDatabase, TelemetryLog};
//! use ldf_research::ResearchConfig;
//!
//! let config = ResearchConfig::new(&None)?;
//! let db = ResearchDatabase::new(&config);
//! db.create_db_and_tables()?;
//!
//! // one session per request
//! db.with_session(|session| {
//!     let mut log = TelemetryLog::new("A1", "gpt", 10, 5, 120, "SUCCESS");
//!     session.telemetry().insert(&mut log)
//! })?;
//! ```

pub mod core;
pub mod research;
pub mod session;

pub use self::core::{
    DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, DEFAULT_BUSY_TIMEOUT,
    SQL_ECHO_TARGET,
};

pub use research::{
    ActFilter, ActJsonEntry, ActMetadata, ActMetadataRepository, ResearchDatabase, TelemetryLog,
    TelemetryRepository, TelemetryStatus, UsageSummary,
};

pub use session::Session;

use rusqlite::ErrorCode;

/// Whether an error was caused by a SQLite constraint violation
///
/// Duplicate `doc_id` inserts into act metadata surface this way.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_plain_error_is_not_constraint_violation() {
        assert!(!is_constraint_violation(&anyhow!("something else")));
    }
}
