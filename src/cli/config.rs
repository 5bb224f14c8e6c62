use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::page::driver::DriverConfig;

pub const DEFAULT_CONFIG_FILE: &str = "scenario-harness.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "scenario-harness",
    version,
    about = "Runs storefront user journeys against a page state model"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: scenario-harness.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios from YAML files
    Run(RunArgs),

    /// Compile scenarios against the model without running them
    Validate {
        /// Path to a scenario YAML file or directory of YAML files
        #[arg(long)]
        scenarios: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a scenario YAML file or directory of YAML files
    #[arg(long)]
    pub scenarios: String,

    /// Page target: simulated or driver
    #[arg(long)]
    pub target: Option<String>,

    /// Output format: console, json
    #[arg(long)]
    pub format: Option<String>,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Base URL that navigation paths are joined onto
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-operation polling timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Delay between poll attempts in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Maximum scenarios running at once
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Append a JSONL step trace to this file
    #[arg(long)]
    pub trace: Option<String>,
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `scenario-harness.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_simulated")]
    pub target: String,

    #[serde(default = "default_console")]
    pub format: String,

    pub output: Option<String>,

    pub trace: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: "simulated".to_string(),
            format: "console".to_string(),
            output: None,
            trace: None,
        }
    }
}

// Serde default helpers
fn default_simulated() -> String { "simulated".to_string() }
fn default_console() -> String { "console".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = config_path, error = %e, "malformed config file, using defaults");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Settings Resolution (CLI > config file > defaults)
// ============================================================================

/// Everything `run` needs, with every layer applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub harness: HarnessConfig,
    pub target: String,
    pub format: String,
    pub output: Option<String>,
    pub trace: Option<String>,
    pub driver: DriverConfig,
}

impl RunSettings {
    pub fn resolve(args: &RunArgs, config: &AppConfig) -> Self {
        let mut harness = config.harness.clone();
        if let Some(url) = &args.base_url {
            harness.base_url = url.clone();
        }
        if let Some(ms) = args.timeout_ms {
            harness.default_timeout_ms = ms;
        }
        if let Some(ms) = args.poll_interval_ms {
            harness.poll_interval_ms = ms;
        }
        if let Some(n) = args.parallel {
            harness.max_parallel_scenarios = n;
        }

        Self {
            harness,
            target: args.target.clone().unwrap_or_else(|| config.run.target.clone()),
            format: args.format.clone().unwrap_or_else(|| config.run.format.clone()),
            output: args.output.clone().or_else(|| config.run.output.clone()),
            trace: args.trace.clone().or_else(|| config.run.trace.clone()),
            driver: config.driver.clone(),
        }
    }
}

/// `-v` count to a default filter directive; `RUST_LOG` wins when set.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
