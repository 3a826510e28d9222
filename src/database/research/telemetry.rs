//! Telemetry log records
//!
//! One row per completed model call. Rows are append-only: this module never
//! updates or deletes them.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage format for timestamps: naive UTC with microsecond precision
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SELECT_COLUMNS: &str = "SELECT id, doc_id, timestamp, model, input_tokens, output_tokens, \
     latency_ms, status, cost_usd FROM telemetrylog";

/// Conventional outcome values for [`TelemetryLog::status`]
///
/// The column itself is free-form text; these are the two values the
/// analysis service writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TelemetryStatus {
    Success,
    Fail,
}

impl TelemetryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryStatus::Success => "SUCCESS",
            TelemetryStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for TelemetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TelemetryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SUCCESS" => Ok(TelemetryStatus::Success),
            "FAIL" => Ok(TelemetryStatus::Fail),
            other => Err(anyhow!("Unknown telemetry status: {}", other)),
        }
    }
}

impl From<TelemetryStatus> for String {
    fn from(status: TelemetryStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A single observed model operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryLog {
    /// Surrogate key, `None` until the record is inserted
    pub id: Option<i64>,
    pub doc_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub latency_ms: i64,
    /// Conventionally `SUCCESS` or `FAIL`, see [`TelemetryStatus`]
    pub status: String,
    pub cost_usd: Option<f64>,
}

impl TelemetryLog {
    /// Create an unsaved record stamped with the current UTC time
    ///
    /// The timestamp is truncated to microseconds, the precision the column
    /// stores, so a record reads back equal to what was written.
    pub fn new(
        doc_id: impl Into<String>,
        model: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
        latency_ms: i64,
        status: impl Into<String>,
    ) -> Self {
        TelemetryLog {
            id: None,
            doc_id: doc_id.into(),
            timestamp: Utc::now().trunc_subsecs(6),
            model: model.into(),
            input_tokens,
            output_tokens,
            latency_ms,
            status: status.into(),
            cost_usd: None,
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(6);
        self
    }

    /// Typed view of `status`; `None` for values outside the convention
    pub fn status_kind(&self) -> Option<TelemetryStatus> {
        self.status.parse().ok()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw_ts: String = row.get(2)?;
        Ok(TelemetryLog {
            id: row.get(0)?,
            doc_id: row.get(1)?,
            timestamp: parse_timestamp(&raw_ts)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?,
            model: row.get(3)?,
            input_tokens: row.get(4)?,
            output_tokens: row.get(5)?,
            latency_ms: row.get(6)?,
            status: row.get(7)?,
            cost_usd: row.get(8)?,
        })
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(naive) => Ok(naive.and_utc()),
        Err(e) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| e),
    }
}

/// Aggregated usage over a set of telemetry rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub calls: u64,
    pub success: u64,
    pub fail: u64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_cost_usd: f64,
    /// `None` when there are no rows
    pub avg_latency_ms: Option<f64>,
}

/// Repository for telemetry log operations
pub struct TelemetryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> TelemetryRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a record and assign its surrogate key
    ///
    /// A record that already carries an `id` is inserted under that key.
    pub fn insert(&self, log: &mut TelemetryLog) -> Result<i64> {
        let sql = "INSERT INTO telemetrylog \
             (id, doc_id, timestamp, model, input_tokens, output_tokens, latency_ms, status, cost_usd) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

        self.conn
            .execute(
                sql,
                params![
                    log.id,
                    log.doc_id,
                    format_timestamp(&log.timestamp),
                    log.model,
                    log.input_tokens,
                    log.output_tokens,
                    log.latency_ms,
                    log.status,
                    log.cost_usd,
                ],
            )
            .with_context(|| format!("Failed to insert telemetry log for '{}'", log.doc_id))?;

        let id = self.conn.last_insert_rowid();
        log.id = Some(id);
        Ok(id)
    }

    /// Get a record by surrogate key
    pub fn get(&self, id: i64) -> Result<Option<TelemetryLog>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);

        self.conn
            .query_row(&sql, [id], TelemetryLog::from_row)
            .optional()
            .with_context(|| format!("Failed to get telemetry log {}", id))
    }

    /// All records referencing a document, oldest first
    pub fn find_by_doc_id(&self, doc_id: &str) -> Result<Vec<TelemetryLog>> {
        let sql = format!("{} WHERE doc_id = ?1 ORDER BY timestamp, id", SELECT_COLUMNS);
        self.query_list(&sql, [doc_id])
    }

    /// The most recent records across all documents, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<TelemetryLog>> {
        let sql = format!(
            "{} ORDER BY timestamp DESC, id DESC LIMIT {}",
            SELECT_COLUMNS, limit
        );
        self.query_list(&sql, [])
    }

    fn query_list<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<TelemetryLog>> {

        let mut stmt = self
            .conn
            .prepare(sql)
            .context("Failed to prepare telemetry query")?;
        let rows = stmt
            .query_map(params, TelemetryLog::from_row)
            .context("Failed to query telemetry logs")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read telemetry row")
    }

    /// Get the count of telemetry records
    pub fn count(&self) -> Result<u64> {
        let sql = "SELECT COUNT(*) FROM telemetrylog";

        self.conn
            .query_row(sql, [], |row| row.get(0))
            .context("Failed to get telemetry count")
    }

    /// Summarize usage, optionally restricted to one document
    pub fn usage_summary(&self, doc_id: Option<&str>) -> Result<UsageSummary> {
        let sql = "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'SUCCESS' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'FAIL' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(input_tokens), 0),
                    COALESCE(SUM(output_tokens), 0),
                    COALESCE(SUM(cost_usd), 0.0),
                    AVG(latency_ms)
             FROM telemetrylog
             WHERE ?1 IS NULL OR doc_id = ?1";

        self.conn
            .query_row(sql, [doc_id], |row| {
                Ok(UsageSummary {
                    calls: row.get(0)?,
                    success: row.get(1)?,
                    fail: row.get(2)?,
                    input_tokens: row.get(3)?,
                    output_tokens: row.get(4)?,
                    total_cost_usd: row.get(5)?,
                    avg_latency_ms: row.get(6)?,
                })
            })
            .context("Failed to summarize telemetry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaManager};
    use chrono::TimeZone;

    fn setup_test_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        let schema = SchemaManager::new(&db);
        schema.initialize().unwrap();
        db
    }

    #[test]
    fn test_new_defaults() {
        let before = Utc::now();
        let log = TelemetryLog::new("A1", "gpt", 10, 5, 120, TelemetryStatus::Success);
        let after = Utc::now();

        assert_eq!(log.id, None);
        assert!(!log.is_persisted());
        assert!(log.timestamp <= after);
        assert!(log.timestamp >= before.trunc_subsecs(6));
        assert_eq!(log.status, "SUCCESS");
        assert_eq!(log.cost_usd, None);
        assert_eq!(log.total_tokens(), 15);
    }

    #[test]
    fn test_status_kind() {
        let ok = TelemetryLog::new("A1", "gpt", 1, 1, 1, "SUCCESS");
        let failed = TelemetryLog::new("A1", "gpt", 1, 1, 1, TelemetryStatus::Fail);
        let other = TelemetryLog::new("A1", "gpt", 1, 1, 1, "TIMEOUT");

        assert_eq!(ok.status_kind(), Some(TelemetryStatus::Success));
        assert_eq!(failed.status_kind(), Some(TelemetryStatus::Fail));
        assert_eq!(other.status_kind(), None);
    }

    #[test]
    fn test_insert_assigns_id() {
        let db = setup_test_db();
        let repo = TelemetryRepository::new(&db.conn);

        let mut first = TelemetryLog::new("A1", "gpt", 10, 5, 120, "SUCCESS");
        let mut second = TelemetryLog::new("A1", "gpt", 20, 7, 80, "FAIL");
        let id1 = repo.insert(&mut first).unwrap();
        let id2 = repo.insert(&mut second).unwrap();

        assert_eq!(first.id, Some(id1));
        assert_eq!(second.id, Some(id2));
        assert_ne!(id1, id2);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_get_round_trip() {
        let db = setup_test_db();
        let repo = TelemetryRepository::new(&db.conn);

        let mut log = TelemetryLog::new("A1", "gpt", 10, 5, 120, "SUCCESS").with_cost(0.0125);
        let id = repo.insert(&mut log).unwrap();

        let stored = repo.get(id).unwrap().unwrap();
        assert_eq!(stored, log);
        assert!(repo.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_find_by_doc_id_orders_by_timestamp() {
        let db = setup_test_db();
        let repo = TelemetryRepository::new(&db.conn);

        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();

        let mut late = TelemetryLog::new("A1", "gpt", 1, 1, 1, "SUCCESS").with_timestamp(t2);
        let mut early = TelemetryLog::new("A1", "gpt", 2, 2, 2, "FAIL").with_timestamp(t1);
        let mut other = TelemetryLog::new("B7", "gpt", 3, 3, 3, "SUCCESS");
        repo.insert(&mut late).unwrap();
        repo.insert(&mut early).unwrap();
        repo.insert(&mut other).unwrap();

        let found = repo.find_by_doc_id("A1").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].timestamp, t1);
        assert_eq!(found[1].timestamp, t2);

        let recent = repo.recent(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].doc_id, "B7");
    }

    #[test]
    fn test_reads_legacy_timestamp_rows() {
        let db = setup_test_db();
        db.conn
            .execute(
                "INSERT INTO telemetrylog (doc_id, timestamp, model, input_tokens, output_tokens, latency_ms, status)
                 VALUES ('A1', '2024-03-05 12:30:45.123456', 'gpt', 1, 2, 3, 'SUCCESS'),
                        ('A1', '2024-03-06 08:00:00', 'gpt', 1, 2, 3, 'SUCCESS')",
                [],
            )
            .unwrap();

        let repo = TelemetryRepository::new(&db.conn);
        let found = repo.find_by_doc_id("A1").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(
            found[0].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 45).unwrap()
                + chrono::Duration::microseconds(123456)
        );
        assert_eq!(
            found[1].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap()
        );
        assert_eq!(found[0].cost_usd, None);
    }

    #[test]
    fn test_usage_summary() {
        let db = setup_test_db();
        let repo = TelemetryRepository::new(&db.conn);

        assert_eq!(
            repo.usage_summary(None).unwrap(),
            UsageSummary::default()
        );

        let mut a = TelemetryLog::new("A1", "gpt", 10, 5, 100, "SUCCESS").with_cost(0.5);
        let mut b = TelemetryLog::new("A1", "gpt", 20, 10, 300, "FAIL");
        let mut c = TelemetryLog::new("B7", "gpt", 1, 1, 50, "SUCCESS").with_cost(0.25);
        repo.insert(&mut a).unwrap();
        repo.insert(&mut b).unwrap();
        repo.insert(&mut c).unwrap();

        let a1 = repo.usage_summary(Some("A1")).unwrap();
        assert_eq!(a1.calls, 2);
        assert_eq!(a1.success, 1);
        assert_eq!(a1.fail, 1);
        assert_eq!(a1.input_tokens, 30);
        assert_eq!(a1.output_tokens, 15);
        assert!((a1.total_cost_usd - 0.5).abs() < f64::EPSILON);
        assert_eq!(a1.avg_latency_ms, Some(200.0));

        let all = repo.usage_summary(None).unwrap();
        assert_eq!(all.calls, 3);
        assert!((all.total_cost_usd - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01 00:00:00.000000");
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z").unwrap(), ts);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
