use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::core::DatabaseConn;
use crate::database::research::{ActMetadataRepository, TelemetryRepository};

/// Keeps the owning database's active-session count accurate
struct SessionLease {
    id: u64,
    active: Arc<AtomicUsize>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!("Session {} released", self.id);
    }
}

/// A unit-of-work handle bound to one SQLite connection
///
/// Obtain one through [`ResearchDatabase::session`] or
/// [`ResearchDatabase::with_session`]. Writes made through the repositories
/// become visible to other sessions only after [`Session::commit`].
///
/// [`ResearchDatabase::session`]: crate::database::ResearchDatabase::session
/// [`ResearchDatabase::with_session`]: crate::database::ResearchDatabase::with_session
pub struct Session {
    // Field order matters: the connection closes before the lease is returned.
    db: DatabaseConn,
    lease: SessionLease,
}

impl Session {
    pub(crate) fn open(
        path: &str,
        busy_timeout: Duration,
        echo: bool,
        id: u64,
        active: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let db = DatabaseConn::open_with_timeout(Some(path), busy_timeout)?;
        if echo {
            db.enable_sql_echo();
        }

        active.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            db,
            lease: SessionLease { id, active },
        };
        session.begin()?;

        debug!("Session {} opened on {}", id, path);
        Ok(session)
    }

    pub fn id(&self) -> u64 {
        self.lease.id
    }

    fn begin(&self) -> Result<()> {
        self.db
            .conn
            .execute_batch("BEGIN")
            .context("Failed to begin transaction")
    }

    /// Repository for telemetry logs within this session
    pub fn telemetry(&self) -> TelemetryRepository<'_> {
        TelemetryRepository::new(&self.db.conn)
    }

    /// Repository for act metadata within this session
    pub fn acts(&self) -> ActMetadataRepository<'_> {
        ActMetadataRepository::new(&self.db.conn)
    }

    /// Get the underlying connection (for queries the repositories don't cover)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Whether the session holds uncommitted work
    pub fn in_transaction(&self) -> bool {
        !self.db.conn.is_autocommit()
    }

    /// Commit the current transaction and start a new one
    ///
    /// If the commit fails the transaction stays open and is rolled back when
    /// the session is dropped.
    pub fn commit(&mut self) -> Result<()> {
        self.commit_current()?;
        self.begin()
    }

    /// Commit the current transaction and release the session
    ///
    /// Unlike [`Session::commit`], no new transaction is opened, so `Ok`
    /// always means the work was persisted.
    pub fn finish(self) -> Result<()> {
        self.commit_current()
    }

    fn commit_current(&self) -> Result<()> {
        self.db
            .conn
            .execute_batch("COMMIT")
            .with_context(|| format!("Failed to commit session {}", self.lease.id))?;
        debug!("Session {} committed", self.lease.id);
        Ok(())
    }

    /// Discard the current transaction and start a new one
    pub fn rollback(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.db
                .conn
                .execute_batch("ROLLBACK")
                .with_context(|| format!("Failed to roll back session {}", self.lease.id))?;
            debug!("Session {} rolled back", self.lease.id);
        }
        self.begin()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction() {
            if let Err(e) = self.db.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back session {}: {}", self.lease.id, e);
            }
        }
    }
}
