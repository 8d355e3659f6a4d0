//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "getlogs-comparator")]
#[command(about = "Differential eth_getLogs tester: reference node vs candidate node", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a comparison campaign against both endpoints
    Run(RunArgs),

    /// Print the default scenario battery as JSON
    Scenarios {
        /// Block span above which a scenario counts as range mode
        #[arg(long, env = "RANGE_MODE_THRESHOLD", default_value = "1000")]
        range_threshold: u64,
    },

    /// Compare two saved eth_getLogs responses offline
    Compare {
        /// Reference response (JSON-RPC envelope or bare result array)
        reference: PathBuf,

        /// Candidate response (JSON-RPC envelope or bare result array)
        candidate: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Reference node RPC endpoint URL
    #[arg(short = 'r', long, env = "REF_RPC_URL", default_value = "http://localhost:8545")]
    pub reference_url: String,

    /// Candidate node RPC endpoint URL
    #[arg(short = 't', long, env = "TEST_RPC_URL", default_value = "http://localhost:8546")]
    pub candidate_url: String,

    /// CSV file comparison results are appended to
    #[arg(short, long, env = "OUTPUT_FILE", default_value = "getlogs_comparison.csv")]
    pub output: PathBuf,

    /// Number of iterations (0 = run until stopped)
    #[arg(short = 'n', long, env = "ITERATIONS", default_value = "1")]
    pub iterations: u64,

    /// Delay between iterations (e.g. 30s, 5m)
    #[arg(short, long, env = "DELAY", default_value = "30s", value_parser = humantime::parse_duration)]
    pub delay: Duration,

    /// Stop after the first iteration with a mismatch or error
    #[arg(long, env = "STOP_ON_ERROR")]
    pub stop_on_error: bool,

    /// Scenarios compared concurrently within one iteration
    #[arg(short, long, env = "CONCURRENCY", default_value = "4")]
    pub concurrency: usize,

    /// Per-request timeout
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub request_timeout: Duration,

    /// Block span above which a scenario counts as range mode
    #[arg(long, env = "RANGE_MODE_THRESHOLD", default_value = "1000")]
    pub range_threshold: u64,

    /// JSON file with the scenario battery (defaults to the built-in one)
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Full campaign configuration as JSON; overrides all other flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the final summary as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}
