use anyhow::Result;
use ldf_research::{ResearchConfig, ResearchDatabase, SchemaStatus};
use serde::Serialize;
use std::path::Path;

use super::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct DatabaseStatus {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    act_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    telemetry_count: Option<u64>,
}

/// Create the tables if they don't exist yet
pub fn run_init(config: &ResearchConfig, output_format: OutputFormat) {
    let db = ResearchDatabase::new(config);
    match db.create_db_and_tables() {
        Ok(()) => {
            if output_format.is_json() {
                print_json(
                    &serde_json::json!({ "path": db.path().display().to_string(), "initialized": true }),
                    false,
                );
            } else {
                println!("Database ready at {}", db.path().display());
            }
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            if !Path::new(&config.data_dir).exists() {
                eprintln!(
                    "The data directory {} does not exist; create or mount it first.",
                    config.data_dir
                );
            }
            std::process::exit(1);
        }
    }
}

fn collect_status(db: &ResearchDatabase) -> Result<DatabaseStatus> {
    let path = db.path();
    let exists = path.exists();
    let size_bytes = if exists {
        std::fs::metadata(path).ok().map(|m| m.len())
    } else {
        None
    };

    let schema = db.schema_status()?;
    let (act_count, telemetry_count) = if schema == SchemaStatus::Current {
        let (acts, logs) = db.with_session(|s| Ok((s.acts().count()?, s.telemetry().count()?)))?;
        (Some(acts), Some(logs))
    } else {
        (None, None)
    };

    Ok(DatabaseStatus {
        path: path.display().to_string(),
        exists,
        size_bytes,
        schema: schema.to_string(),
        act_count,
        telemetry_count,
    })
}

pub fn run_status(config: &ResearchConfig, output_format: OutputFormat) {
    let db = ResearchDatabase::new(config);
    let status = match collect_status(&db) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("ERROR: failed to read database status: {}", e);
            std::process::exit(1);
        }
    };

    if output_format.is_json() {
        print_json(&status, output_format == OutputFormat::JsonPretty);
        return;
    }

    println!("Research Database Status");
    println!("========================\n");
    println!("{}", config.summary());
    println!();
    println!(
        "  Status:         {}",
        if status.exists { "exists" } else { "not created" }
    );
    if let Some(size) = status.size_bytes {
        println!("  Size:           {} bytes", size);
    }
    println!("  Schema:         {}", status.schema);
    if let Some(count) = status.act_count {
        println!("  Acts:           {}", count);
    }
    if let Some(count) = status.telemetry_count {
        println!("  Telemetry Logs: {}", count);
    }
}

pub fn run_reset(config: &ResearchConfig, yes: bool) {
    if !yes {
        eprintln!("ERROR: reset drops all acts and telemetry logs; pass --yes to confirm");
        std::process::exit(1);
    }

    let db = ResearchDatabase::new(config);
    if let Err(e) = db.reset() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
    println!("Dropped research tables at {}", db.path().display());
}
