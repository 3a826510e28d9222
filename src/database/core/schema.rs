//! Database schema management
//!
//! Table and index names follow the layout already present in deployed
//! `research.db` files (`telemetrylog`, `actmetadata`, `ix_telemetrylog_doc_id`)
//! so existing data stays readable.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::DatabaseConn;

/// Schema definitions for all tables in the research database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    pub const TELEMETRY_LOG: &'static str = "telemetrylog";
    pub const ACT_METADATA: &'static str = "actmetadata";

    /// SQL for creating the telemetry log table
    pub const TELEMETRY_LOG_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS telemetrylog (
            id INTEGER NOT NULL,
            doc_id VARCHAR NOT NULL,
            timestamp DATETIME NOT NULL,
            model VARCHAR NOT NULL,
            input_tokens INTEGER NOT NULL,
            output_tokens INTEGER NOT NULL,
            latency_ms INTEGER NOT NULL,
            status VARCHAR NOT NULL,
            cost_usd FLOAT,
            PRIMARY KEY (id)
        );
    "#;

    /// SQL for creating the act metadata table
    pub const ACT_METADATA_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS actmetadata (
            doc_id VARCHAR NOT NULL,
            doc_type VARCHAR NOT NULL,
            num VARCHAR NOT NULL,
            date_str VARCHAR NOT NULL,
            description VARCHAR NOT NULL,
            url_metadata VARCHAR,
            lang VARCHAR NOT NULL,
            url_pdf VARCHAR,
            doc_number VARCHAR,
            domain VARCHAR,
            year VARCHAR NOT NULL,
            PRIMARY KEY (doc_id)
        );
    "#;

    /// Non-unique lookup index on the telemetry document reference
    pub const TELEMETRY_LOG_INDEXES: &'static [&'static str] =
        &["CREATE INDEX IF NOT EXISTS ix_telemetrylog_doc_id ON telemetrylog (doc_id)"];

    /// Names of every table the schema owns
    pub const TABLES: &'static [&'static str] = &[Self::TELEMETRY_LOG, Self::ACT_METADATA];
}

/// Schema manager for the research database
///
/// Handles schema initialization, status checks and resets.
pub struct SchemaManager<'a> {
    conn: &'a DatabaseConn,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a DatabaseConn) -> Self {
        Self { conn }
    }

    /// Initialize the database schema
    ///
    /// Creates all tables and indexes that don't exist yet. Calling this on an
    /// initialized database changes nothing.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::TELEMETRY_LOG_TABLE)
            .context("Failed to create telemetrylog table")?;

        for index_sql in SchemaDefinitions::TELEMETRY_LOG_INDEXES {
            self.conn
                .execute(index_sql)
                .context("Failed to create telemetrylog index")?;
        }

        self.conn
            .execute(SchemaDefinitions::ACT_METADATA_TABLE)
            .context("Failed to create actmetadata table")?;

        debug!("Research database schema ensured");
        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let missing = self.missing_tables()?;

        if missing.is_empty() {
            Ok(SchemaStatus::Current)
        } else if missing.len() == SchemaDefinitions::TABLES.len() {
            Ok(SchemaStatus::NotInitialized)
        } else {
            Ok(SchemaStatus::Incomplete { missing })
        }
    }

    /// List the schema tables not present in the database
    pub fn missing_tables(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for table in SchemaDefinitions::TABLES {
            if !self.conn.table_exists(table)? {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    /// Reset the database by dropping all tables
    pub fn reset(&self) -> Result<()> {
        self.conn.execute("DROP INDEX IF EXISTS ix_telemetrylog_doc_id")?;
        self.conn.execute("DROP TABLE IF EXISTS telemetrylog")?;
        self.conn.execute("DROP TABLE IF EXISTS actmetadata")?;

        info!("Research database tables dropped");
        Ok(())
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// No schema tables exist yet
    NotInitialized,

    /// All tables are present
    Current,

    /// Some tables exist, others are missing
    Incomplete { missing: Vec<String> },
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current => write!(f, "initialized"),
            SchemaStatus::Incomplete { missing } => {
                write!(f, "incomplete (missing: {})", missing.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> DatabaseConn {
        DatabaseConn::open_in_memory().unwrap()
    }

    fn schema_object_count(db: &DatabaseConn) -> i64 {
        db.conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_schema_initialize() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();

        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert!(manager.missing_tables().unwrap().is_empty());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        let objects = schema_object_count(&conn);

        manager.initialize().unwrap();
        assert_eq!(schema_object_count(&conn), objects);
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_doc_id_index_created() {
        let conn = create_test_db();
        SchemaManager::new(&conn).initialize().unwrap();

        assert!(conn.index_exists("ix_telemetrylog_doc_id").unwrap());

        let unique: i64 = conn
            .conn
            .query_row(
                "SELECT \"unique\" FROM pragma_index_list('telemetrylog') WHERE name = 'ix_telemetrylog_doc_id'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(unique, 0);
    }

    #[test]
    fn test_schema_incomplete() {
        let conn = create_test_db();
        conn.execute(SchemaDefinitions::ACT_METADATA_TABLE).unwrap();

        let manager = SchemaManager::new(&conn);
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Incomplete {
                missing: vec!["telemetrylog".to_string()]
            }
        );
    }

    #[test]
    fn test_schema_reset() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.initialize().unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);

        manager.reset().unwrap();
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
        assert_eq!(schema_object_count(&conn), 0);
    }
}
