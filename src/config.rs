use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "research.toml";

/// Environment variable prefix, e.g. `LDF_RESEARCH_DATA_DIR=/srv/data`
pub const ENV_PREFIX: &str = "LDF_RESEARCH";

#[derive(Debug, Clone, Serialize)]
pub struct ResearchConfig {
    /// Directory holding the database file; must already exist
    pub data_dir: String,

    /// Database file name inside `data_dir`
    pub db_file_name: String,

    /// Log every SQL statement at debug level
    pub echo: bool,

    /// How long a session waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());

        Self {
            data_dir: format!("{}/data", cwd),
            db_file_name: "research.db".to_string(),
            echo: false,
            busy_timeout_ms: 5000,
        }
    }
}

impl ResearchConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Sources, lowest precedence first: built-in defaults, the TOML file
    /// (`path`, else `./research.toml` when present), then `LDF_RESEARCH_*`
    /// environment variables. Nothing is written to disk.
    pub fn new(path: &Option<String>) -> Result<ResearchConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                if !Path::new(p.as_str()).exists() {
                    return Err(anyhow!("Config file not found: {}", p));
                }
                builder = builder.add_source(config::File::with_name(p.as_str()));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    builder = builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE));
                }
            }
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<ResearchConfig> {
        let defaults = ResearchConfig::default();

        let data_dir = config
            .get("data_dir")
            .cloned()
            .unwrap_or(defaults.data_dir);

        let db_file_name = config
            .get("db_file_name")
            .cloned()
            .unwrap_or(defaults.db_file_name);

        let echo = match config.get("echo") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| anyhow!("Invalid value for echo: {}", v))?,
            None => defaults.echo,
        };

        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| anyhow!("Invalid value for busy_timeout_ms: {}", v))?,
            None => defaults.busy_timeout_ms,
        };

        Ok(ResearchConfig {
            data_dir,
            db_file_name,
            echo,
            busy_timeout_ms,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, self.db_file_name)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("SQL Echo:           {}", self.echo),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
        ];

        if !Path::new(&self.data_dir).exists() {
            lines.push("Warning:            data directory does not exist".to_string());
        }

        lines.join("\n")
    }
}
