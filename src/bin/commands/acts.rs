use clap::{Args, Subcommand};
use ldf_research::{ActFilter, ActMetadata, ResearchConfig};
use tabled::Tabled;

use super::{open_database, opt_display, print_json, print_records, OutputFormat};

/// Arguments for the Acts command
#[derive(Args)]
pub struct ActsArgs {
    #[clap(subcommand)]
    pub command: ActsCommands,
}

#[derive(Subcommand)]
pub enum ActsCommands {
    /// Show the metadata of one document
    Get {
        #[clap(value_name = "DOC_ID")]
        doc_id: String,
    },

    /// List documents, ordered by document id
    List {
        /// Filter by document type
        #[clap(long)]
        doc_type: Option<String>,

        /// Filter by year
        #[clap(short, long)]
        year: Option<String>,

        /// Filter by language code
        #[clap(long)]
        lang: Option<String>,

        /// Maximum number of records
        #[clap(short, long)]
        limit: Option<usize>,

        /// Records to skip
        #[clap(long)]
        offset: Option<usize>,
    },

    /// Upsert documents from an acts.json export
    Import {
        #[clap(value_name = "FILE")]
        file: String,
    },
}

#[derive(Tabled)]
struct ActRow {
    doc_id: String,
    doc_type: String,
    num: String,
    date: String,
    year: String,
    lang: String,
    description: String,
    url_pdf: String,
}

fn to_row(act: &ActMetadata) -> ActRow {
    ActRow {
        doc_id: act.doc_id.clone(),
        doc_type: act.doc_type.clone(),
        num: act.num.clone(),
        date: act.date_str.clone(),
        year: act.year.clone(),
        lang: act.lang.clone(),
        description: truncate(&act.description, 60),
        url_pdf: opt_display(&act.url_pdf),
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

pub fn run(config: &ResearchConfig, args: ActsArgs, output_format: OutputFormat) {
    let db = open_database(config);

    match args.command {
        ActsCommands::Get { doc_id } => {
            match db.with_session(|s| s.acts().get(&doc_id)) {
                Ok(Some(act)) => print_records(&[act], output_format, to_row),
                Ok(None) => {
                    eprintln!("ERROR: no act metadata for '{}'", doc_id);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ActsCommands::List {
            doc_type,
            year,
            lang,
            limit,
            offset,
        } => {
            let filter = ActFilter {
                doc_type,
                year,
                lang,
                limit,
                offset,
            };
            match db.with_session(|s| s.acts().list(&filter)) {
                Ok(acts) => print_records(&acts, output_format, to_row),
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    std::process::exit(1);
                }
            }
        }
        ActsCommands::Import { file } => {
            match db.with_session(|s| s.acts().import_json(&file)) {
                Ok(count) => {
                    if output_format.is_json() {
                        print_json(&serde_json::json!({ "imported": count }), false);
                    } else {
                        println!("Imported {} act metadata records from {}", count, file);
                    }
                }
                Err(e) => {
                    eprintln!("ERROR: import failed, nothing was written: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
