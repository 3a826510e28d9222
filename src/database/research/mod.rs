//! Research database storage
//!
//! The research database is a single SQLite file holding:
//! - Telemetry logs (one row per model call)
//! - Act metadata (one row per known document)

mod acts;
mod telemetry;

pub use acts::{ActFilter, ActJsonEntry, ActMetadata, ActMetadataRepository};
pub use telemetry::{TelemetryLog, TelemetryRepository, TelemetryStatus, UsageSummary};

use crate::config::ResearchConfig;
use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus, DEFAULT_BUSY_TIMEOUT};
use crate::database::session::Session;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Connection configuration for the research database
///
/// Construct one at startup and hand clones (or references) to whatever issues
/// sessions; clones share the active-session count. Constructing it performs
/// no I/O: the file is first touched by [`create_db_and_tables`] or
/// [`session`].
///
/// [`create_db_and_tables`]: ResearchDatabase::create_db_and_tables
/// [`session`]: ResearchDatabase::session
#[derive(Debug, Clone)]
pub struct ResearchDatabase {
    path: PathBuf,
    echo: bool,
    busy_timeout: Duration,
    active: Arc<AtomicUsize>,
    next_session_id: Arc<AtomicU64>,
}

impl ResearchDatabase {
    /// Build from configuration, resolving `{data_dir}/{db_file_name}`
    pub fn new(config: &ResearchConfig) -> Self {
        Self::open(config.sqlite_path())
            .with_echo(config.echo)
            .with_busy_timeout(config.busy_timeout())
    }

    /// Use the database file at `path` with default settings
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        ResearchDatabase {
            path: path.into(),
            echo: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            active: Arc::new(AtomicUsize::new(0)),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Log every SQL statement at debug level under `ldf_research::sql`
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> Result<&str> {
        self.path
            .to_str()
            .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", self.path.display()))
    }

    fn connect(&self) -> Result<DatabaseConn> {
        let db = DatabaseConn::open_with_timeout(Some(self.path_str()?), self.busy_timeout)?;
        if self.echo {
            db.enable_sql_echo();
        }
        Ok(db)
    }

    /// Create the telemetry and act metadata tables if they don't exist
    ///
    /// Safe to call repeatedly. Fails if the database file can't be opened
    /// for writing, e.g. when its directory is missing.
    pub fn create_db_and_tables(&self) -> Result<()> {
        let db = self.connect()?;
        let schema = SchemaManager::new(&db);

        if schema.check_status()? != SchemaStatus::Current {
            info!("Initializing research database schema at {}", self.path.display());
        }
        schema.initialize()
    }

    /// Report the schema state without creating the database file
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        if !self.path.exists() {
            return Ok(SchemaStatus::NotInitialized);
        }
        let db = self.connect()?;
        SchemaManager::new(&db).check_status()
    }

    /// Drop both tables
    pub fn reset(&self) -> Result<()> {
        let db = self.connect()?;
        SchemaManager::new(&db).reset()
    }

    /// Open a scoped session for one unit of work
    ///
    /// The session rolls back uncommitted work and releases its connection
    /// when dropped.
    pub fn session(&self) -> Result<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Session::open(
            self.path_str()?,
            self.busy_timeout,
            self.echo,
            id,
            Arc::clone(&self.active),
        )
    }

    /// Run `f` inside a session, committing if it returns `Ok`
    ///
    /// On `Err` (or a panic) the session is dropped without committing, which
    /// rolls its work back. An `Err` after `f` succeeded means the commit
    /// itself failed and nothing was persisted.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = self.session()?;
        let value = f(&mut session)?;
        session.finish()?;
        Ok(value)
    }

    /// Number of sessions currently open against this database
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ResearchDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = ResearchDatabase::open(dir.path().join("research.db"));
        db.create_db_and_tables().unwrap();
        (dir, db)
    }

    fn act(doc_id: &str) -> ActMetadata {
        ActMetadata::new(doc_id, "report", "1", "2024-01-01", "x", "en", "2024")
    }

    #[test]
    fn test_from_config() {
        let config = ResearchConfig {
            data_dir: "/srv/ldf/data".to_string(),
            db_file_name: "research.db".to_string(),
            echo: true,
            busy_timeout_ms: 250,
        };
        let db = ResearchDatabase::new(&config);
        assert_eq!(db.path(), Path::new("/srv/ldf/data/research.db"));
        assert!(db.echo);
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
        assert_eq!(db.active_sessions(), 0);
    }

    #[test]
    fn test_schema_status_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = ResearchDatabase::open(dir.path().join("research.db"));

        assert_eq!(db.schema_status().unwrap(), SchemaStatus::NotInitialized);
        assert!(!db.path().exists());

        db.create_db_and_tables().unwrap();
        assert_eq!(db.schema_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_create_fails_without_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = ResearchDatabase::open(dir.path().join("data").join("research.db"));

        assert!(db.create_db_and_tables().is_err());
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_session_ids_and_count() {
        let (_dir, db) = setup();

        let first = db.session().unwrap();
        let second = db.session().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(db.active_sessions(), 2);

        drop(first);
        assert_eq!(db.active_sessions(), 1);
        drop(second);
        assert_eq!(db.active_sessions(), 0);
    }

    #[test]
    fn test_uncommitted_work_is_rolled_back_on_drop() {
        let (_dir, db) = setup();

        {
            let session = db.session().unwrap();
            session.acts().insert(&act("A1")).unwrap();
            assert!(session.in_transaction());
        }

        let session = db.session().unwrap();
        assert_eq!(session.acts().count().unwrap(), 0);
    }

    #[test]
    fn test_commit_is_visible_to_other_sessions() {
        let (_dir, db) = setup();

        let mut writer = db.session().unwrap();
        writer.acts().insert(&act("A1")).unwrap();
        writer.commit().unwrap();

        let reader = db.session().unwrap();
        assert!(reader.acts().exists("A1").unwrap());

        // the writer stays usable after a commit
        writer.acts().insert(&act("A2")).unwrap();
        writer.rollback().unwrap();
        assert!(!writer.acts().exists("A2").unwrap());
    }

    #[test]
    fn test_with_session_commits_on_ok() {
        let (_dir, db) = setup();

        let id = db
            .with_session(|s| {
                s.acts().insert(&act("A1"))?;
                let mut log = TelemetryLog::new("A1", "gpt", 10, 5, 120, "SUCCESS");
                s.telemetry().insert(&mut log)
            })
            .unwrap();

        assert_eq!(db.active_sessions(), 0);
        let stored = db.with_session(|s| s.telemetry().get(id)).unwrap();
        assert_eq!(stored.map(|l| l.doc_id), Some("A1".to_string()));
    }

    #[test]
    fn test_with_session_rolls_back_on_err() {
        let (_dir, db) = setup();

        let result: Result<()> = db.with_session(|s| {
            s.acts().insert(&act("A1"))?;
            Err(anyhow!("handler failed"))
        });

        assert!(result.is_err());
        assert_eq!(db.active_sessions(), 0);
        assert_eq!(db.with_session(|s| s.acts().count()).unwrap(), 0);
    }

    #[test]
    fn test_reset_drops_tables() {
        let (_dir, db) = setup();
        db.reset().unwrap();
        assert_eq!(db.schema_status().unwrap(), SchemaStatus::NotInitialized);
    }
}
