pub mod acts;
pub mod database;
pub mod telemetry;

use ldf_research::{ResearchConfig, ResearchDatabase};
use serde::Serialize;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// One JSON object per line
    JsonLine,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "json-line"]
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Open the configured database or exit with an error message
pub(crate) fn open_database(config: &ResearchConfig) -> ResearchDatabase {
    let db = ResearchDatabase::new(config);
    match db.schema_status() {
        Ok(ldf_research::SchemaStatus::Current) => db,
        Ok(status) => {
            eprintln!(
                "ERROR: database at {} is {} (run: ldf-research init)",
                db.path().display(),
                status
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print records as JSON or as a table of display rows
pub(crate) fn print_records<T, R>(records: &[T], output_format: OutputFormat, to_row: fn(&T) -> R)
where
    T: Serialize,
    R: Tabled,
{
    match output_format {
        OutputFormat::Json => print_json(&records, false),
        OutputFormat::JsonPretty => print_json(&records, true),
        OutputFormat::JsonLine => {
            for record in records {
                print_json(record, false);
            }
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            let rows: Vec<R> = records.iter().map(to_row).collect();
            let mut table = Table::new(rows);
            if output_format == OutputFormat::Markdown {
                table.with(Style::markdown());
            } else {
                table.with(Style::rounded());
            }
            println!("{}", table);
        }
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match result {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

pub(crate) fn opt_display(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
