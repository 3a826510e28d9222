//! Core database infrastructure
//!
//! This module provides the foundational database components:
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema initialization and management
//! - `SchemaStatus`: Schema state enumeration

mod connection;
mod schema;

pub use connection::{DatabaseConn, DEFAULT_BUSY_TIMEOUT, SQL_ECHO_TARGET};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus};
