//! Scoped sessions
//!
//! A [`Session`] is one unit of work: it owns a dedicated SQLite connection and
//! an open transaction. Dropping the session rolls back anything uncommitted
//! and closes the connection, whichever way the owning scope exits.

mod scoped;

pub use scoped::Session;
