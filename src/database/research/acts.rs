//! Act metadata records
//!
//! One row per known legislative document, keyed by `doc_id`. Rows are written
//! by ingestion (see [`ActMetadataRepository::import_json`]) and read by the
//! analysis service.

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const SELECT_COLUMNS: &str = "SELECT doc_id, doc_type, num, date_str, description, url_metadata, \
     lang, url_pdf, doc_number, domain, year FROM actmetadata";

/// Metadata describing one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActMetadata {
    pub doc_id: String,
    pub doc_type: String,
    pub num: String,
    pub date_str: String,
    pub description: String,
    pub url_metadata: Option<String>,
    pub lang: String,
    pub url_pdf: Option<String>,
    pub doc_number: Option<String>,
    pub domain: Option<String>,
    pub year: String,
}

impl ActMetadata {
    /// Create a record with all required fields; optional fields start empty
    pub fn new(
        doc_id: impl Into<String>,
        doc_type: impl Into<String>,
        num: impl Into<String>,
        date_str: impl Into<String>,
        description: impl Into<String>,
        lang: impl Into<String>,
        year: impl Into<String>,
    ) -> Self {
        ActMetadata {
            doc_id: doc_id.into(),
            doc_type: doc_type.into(),
            num: num.into(),
            date_str: date_str.into(),
            description: description.into(),
            url_metadata: None,
            lang: lang.into(),
            url_pdf: None,
            doc_number: None,
            domain: None,
            year: year.into(),
        }
    }

    pub fn with_url_pdf(mut self, url: impl Into<String>) -> Self {
        self.url_pdf = Some(url.into());
        self
    }

    pub fn with_doc_number(mut self, doc_number: impl Into<String>) -> Self {
        self.doc_number = Some(doc_number.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ActMetadata {
            doc_id: row.get(0)?,
            doc_type: row.get(1)?,
            num: row.get(2)?,
            date_str: row.get(3)?,
            description: row.get(4)?,
            url_metadata: row.get(5)?,
            lang: row.get(6)?,
            url_pdf: row.get(7)?,
            doc_number: row.get(8)?,
            domain: row.get(9)?,
            year: row.get(10)?,
        })
    }
}

/// An entry of the dashboard's `acts.json` export
///
/// Optional columns come through as empty strings and `year` may be missing.
#[derive(Debug, Clone, Deserialize)]
pub struct ActJsonEntry {
    pub doc_id: String,
    pub doc_type: String,
    pub num: String,
    pub date_str: String,
    pub description: String,
    #[serde(default)]
    pub url_metadata: Option<String>,
    pub lang: String,
    #[serde(default)]
    pub url_pdf: Option<String>,
    #[serde(default)]
    pub doc_number: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<ActJsonEntry> for ActMetadata {
    type Error = anyhow::Error;

    fn try_from(entry: ActJsonEntry) -> Result<Self> {
        let year = match non_empty(entry.year) {
            Some(year) => year,
            None => {
                let prefix: String = entry.date_str.chars().take(4).collect();
                if prefix.len() == 4 && prefix.chars().all(|c| c.is_ascii_digit()) {
                    prefix
                } else {
                    return Err(anyhow!(
                        "Act '{}' has no year and date '{}' does not start with one",
                        entry.doc_id,
                        entry.date_str
                    ));
                }
            }
        };

        Ok(ActMetadata {
            doc_id: entry.doc_id,
            doc_type: entry.doc_type,
            num: entry.num,
            date_str: entry.date_str,
            description: entry.description,
            url_metadata: non_empty(entry.url_metadata),
            lang: entry.lang,
            url_pdf: non_empty(entry.url_pdf),
            doc_number: non_empty(entry.doc_number),
            domain: non_empty(entry.domain),
            year,
        })
    }
}

/// Filters for listing act metadata
#[derive(Debug, Clone, Default)]
pub struct ActFilter {
    pub doc_type: Option<String>,
    pub year: Option<String>,
    pub lang: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Repository for act metadata operations
pub struct ActMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ActMetadataRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new record
    ///
    /// Fails with a constraint violation if `doc_id` is already present.
    pub fn insert(&self, act: &ActMetadata) -> Result<()> {
        let sql = "INSERT INTO actmetadata \
             (doc_id, doc_type, num, date_str, description, url_metadata, lang, url_pdf, doc_number, domain, year) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";
        self.write(sql, act)
            .with_context(|| format!("Failed to insert act metadata '{}'", act.doc_id))
    }

    /// Insert a record or replace every column of the existing one
    pub fn upsert(&self, act: &ActMetadata) -> Result<()> {
        let sql = "INSERT INTO actmetadata \
             (doc_id, doc_type, num, date_str, description, url_metadata, lang, url_pdf, doc_number, domain, year) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(doc_id) DO UPDATE SET \
                doc_type = excluded.doc_type, \
                num = excluded.num, \
                date_str = excluded.date_str, \
                description = excluded.description, \
                url_metadata = excluded.url_metadata, \
                lang = excluded.lang, \
                url_pdf = excluded.url_pdf, \
                doc_number = excluded.doc_number, \
                domain = excluded.domain, \
                year = excluded.year";
        self.write(sql, act)
            .with_context(|| format!("Failed to upsert act metadata '{}'", act.doc_id))
    }

    fn write(&self, sql: &str, act: &ActMetadata) -> rusqlite::Result<()> {
        self.conn.execute(
            sql,
            params![
                act.doc_id,
                act.doc_type,
                act.num,
                act.date_str,
                act.description,
                act.url_metadata,
                act.lang,
                act.url_pdf,
                act.doc_number,
                act.domain,
                act.year,
            ],
        )?;
        Ok(())
    }

    /// Get a record by document id
    pub fn get(&self, doc_id: &str) -> Result<Option<ActMetadata>> {
        let sql = format!("{} WHERE doc_id = ?1", SELECT_COLUMNS);

        self.conn
            .query_row(&sql, [doc_id], ActMetadata::from_row)
            .optional()
            .with_context(|| format!("Failed to get act metadata '{}'", doc_id))
    }

    pub fn exists(&self, doc_id: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM actmetadata WHERE doc_id = ?1";

        let count: i64 = self
            .conn
            .query_row(sql, [doc_id], |row| row.get(0))
            .with_context(|| format!("Failed to check act metadata '{}'", doc_id))?;
        Ok(count > 0)
    }

    /// Get the count of act metadata records
    pub fn count(&self) -> Result<u64> {
        let sql = "SELECT COUNT(*) FROM actmetadata";

        self.conn
            .query_row(sql, [], |row| row.get(0))
            .context("Failed to get act metadata count")
    }

    /// List records matching the filter, ordered by `doc_id`
    pub fn list(&self, filter: &ActFilter) -> Result<Vec<ActMetadata>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<&str> = Vec::new();

        if let Some(doc_type) = &filter.doc_type {
            conditions.push("doc_type = ?");
            values.push(doc_type);
        }
        if let Some(year) = &filter.year {
            conditions.push("year = ?");
            values.push(year);
        }
        if let Some(lang) = &filter.lang {
            conditions.push("lang = ?");
            values.push(lang);
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY doc_id");

        // SQLite requires a LIMIT before OFFSET; -1 means unbounded
        match (filter.limit, filter.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare act metadata query")?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), ActMetadata::from_row)
            .context("Failed to list act metadata")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read act metadata row")
    }

    /// Upsert every act from an `acts.json` export
    ///
    /// Runs inside the caller's session; nothing is persisted until the
    /// session commits. Returns the number of records written.
    pub fn import_json<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        info!("Loading act metadata from {}...", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let entries: Vec<ActJsonEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse act metadata from {}", path.display()))?;

        let acts = entries
            .into_iter()
            .map(ActMetadata::try_from)
            .collect::<Result<Vec<_>>>()?;

        for act in &acts {
            self.upsert(act)?;
        }

        info!("Act metadata import finished: {} records", acts.len());
        Ok(acts.len())
    }
}
