use clap::{Args, Subcommand};
use ldf_research::{ResearchConfig, TelemetryLog, UsageSummary};
use tabled::Tabled;

use super::{open_database, print_json, print_records, OutputFormat};

/// Arguments for the Telemetry command
#[derive(Args)]
pub struct TelemetryArgs {
    #[clap(subcommand)]
    pub command: TelemetryCommands,
}

#[derive(Subcommand)]
pub enum TelemetryCommands {
    /// List telemetry logs, for one document or the most recent overall
    List {
        /// Only logs referencing this document (oldest first)
        #[clap(short, long)]
        doc_id: Option<String>,

        /// Maximum number of records when listing recent logs
        #[clap(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Aggregate token usage, cost and latency
    Summary {
        /// Only logs referencing this document
        #[clap(short, long)]
        doc_id: Option<String>,
    },
}

#[derive(Tabled)]
struct TelemetryRow {
    id: String,
    doc_id: String,
    timestamp: String,
    model: String,
    input_tokens: i64,
    output_tokens: i64,
    latency_ms: i64,
    status: String,
    cost_usd: String,
}

fn to_row(log: &TelemetryLog) -> TelemetryRow {
    TelemetryRow {
        id: log.id.map(|id| id.to_string()).unwrap_or_default(),
        doc_id: log.doc_id.clone(),
        timestamp: log.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        model: log.model.clone(),
        input_tokens: log.input_tokens,
        output_tokens: log.output_tokens,
        latency_ms: log.latency_ms,
        status: log.status.clone(),
        cost_usd: log.cost_usd.map(|c| format!("{:.6}", c)).unwrap_or_default(),
    }
}

pub fn run(config: &ResearchConfig, args: TelemetryArgs, output_format: OutputFormat) {
    let db = open_database(config);

    match args.command {
        TelemetryCommands::List { doc_id, limit } => {
            let result = db.with_session(|s| match &doc_id {
                Some(doc_id) => s.telemetry().find_by_doc_id(doc_id),
                None => s.telemetry().recent(limit),
            });
            match result {
                Ok(logs) => print_records(&logs, output_format, to_row),
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    std::process::exit(1);
                }
            }
        }
        TelemetryCommands::Summary { doc_id } => {
            match db.with_session(|s| s.telemetry().usage_summary(doc_id.as_deref())) {
                Ok(summary) => print_summary(&summary, doc_id.as_deref(), output_format),
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_summary(summary: &UsageSummary, doc_id: Option<&str>, output_format: OutputFormat) {
    if output_format.is_json() {
        print_json(summary, output_format == OutputFormat::JsonPretty);
        return;
    }

    println!("Telemetry Summary ({})", doc_id.unwrap_or("all documents"));
    println!("  Calls:          {}", summary.calls);
    println!("  Success:        {}", summary.success);
    println!("  Fail:           {}", summary.fail);
    println!("  Input Tokens:   {}", summary.input_tokens);
    println!("  Output Tokens:  {}", summary.output_tokens);
    println!("  Total Cost:     ${:.4}", summary.total_cost_usd);
    match summary.avg_latency_ms {
        Some(avg) => println!("  Avg Latency:    {:.1} ms", avg),
        None => println!("  Avg Latency:    -"),
    }
}
