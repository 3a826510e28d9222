#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! ldf-research - persistence layer for the LDF research service
//!
//! Stores two kinds of records in a single SQLite file
//! (`<cwd>/data/research.db` by default):
//!
//! - [`TelemetryLog`]: one row per model call (tokens, latency, outcome, cost)
//! - [`ActMetadata`]: one row per known legislative document
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | `ldf-research` operator binary | `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! ldf-research = { version = "0.1", default-features = false }
//! ```
//!
//! # Lifecycle
//!
//! Build one [`ResearchDatabase`] at startup, call
//! [`ResearchDatabase::create_db_and_tables`] once, then open one
//! [`Session`] per unit of work:
//!
//! ```rust,ignore
//! use ldf_research::{ActMetadata, ResearchConfig, ResearchDatabase, TelemetryLog};
//!
//! let config = ResearchConfig::new(&None)?;
//! let db = ResearchDatabase::new(&config);
//! db.create_db_and_tables()?;
//!
//! db.with_session(|session| {
//!     session.acts().upsert(&ActMetadata::new(
//!         "A1", "report", "1", "2024-01-01", "x", "en", "2024",
//!     ))?;
//!     let mut log = TelemetryLog::new("A1", "gpt", 10, 5, 120, "SUCCESS");
//!     session.telemetry().insert(&mut log)?;
//!     Ok(())
//! })?;
//! ```
//!
//! A session that goes out of scope without committing rolls its work back.

pub mod config;
pub mod database;

pub use config::ResearchConfig;

pub use database::{
    is_constraint_violation, ActFilter, ActMetadata, ResearchDatabase, SchemaStatus, Session,
    TelemetryLog, TelemetryStatus, UsageSummary,
};
