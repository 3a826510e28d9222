mod commands;

use clap::{Parser, Subcommand};
use ldf_research::ResearchConfig;
use tracing::Level;

use commands::acts::ActsArgs;
use commands::telemetry::TelemetryArgs;
use commands::OutputFormat;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default ./research.toml is used if present
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables if they don't exist
    Init,

    /// Show configuration, schema status and record counts
    Status,

    /// Act metadata lookup and import
    Acts(ActsArgs),

    /// Telemetry log listing and usage summaries
    Telemetry(TelemetryArgs),

    /// Drop all research tables
    Reset {
        /// Confirm dropping all data
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // SQL echo is logged at debug level
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config = match ResearchConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Init => commands::database::run_init(&config, cli.format),
        Commands::Status => commands::database::run_status(&config, cli.format),
        Commands::Acts(args) => commands::acts::run(&config, args, cli.format),
        Commands::Telemetry(args) => commands::telemetry::run(&config, args, cli.format),
        Commands::Reset { yes } => commands::database::run_reset(&config, yes),
    }
}
