//! getlogs-comparator - differential eth_getLogs tester

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use getlogs_comparator::cli::{Cli, Command, LogFormat, RunArgs};
use getlogs_comparator::compare::{compare, describe_divergence};
use getlogs_comparator::config::CampaignConfig;
use getlogs_comparator::normalize::{normalize, unwrap_envelope};
use getlogs_comparator::query::ProcessingMode;
use getlogs_comparator::report::{print_summary, CampaignSummary};
use getlogs_comparator::rpc::RpcClient;
use getlogs_comparator::scenarios;
use getlogs_comparator::sink::CsvSink;
use getlogs_comparator::types::{EndpointResponse, Status};
use getlogs_comparator::CampaignRunner;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.log_format);

    let exit_code = match &cli.command {
        Command::Run(args) => {
            print_banner();
            run_campaign(args).await?
        }
        Command::Scenarios { range_threshold } => print_scenarios(*range_threshold)?,
        Command::Compare { reference, candidate } => compare_files(reference, candidate)?,
    };

    // Exit with appropriate code
    if exit_code != 0 {
        process::exit(exit_code);
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

fn print_banner() {
    println!("{}", "╔══════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║      eth_getLogs DIFFERENTIAL COMPARATOR             ║".bright_cyan());
    println!("{}", "║      Reference vs Candidate Node                     ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn print_config(config: &CampaignConfig) {
    println!("{}", "Configuration:".bright_yellow().bold());
    println!("  Reference: {}", config.reference_url);
    println!("  Candidate: {}", config.candidate_url);
    println!("  Output: {}", config.output.display());
    if config.is_bounded() {
        println!("  Iterations: {}", config.iterations);
    } else {
        println!("  Iterations: unbounded (Ctrl+C to stop)");
    }
    println!("  Delay: {}", humantime::format_duration(config.delay));
    println!("  Stop on error: {}", config.stop_on_error);
    println!("  Concurrency: {}", config.concurrency);
    println!("  Scenarios: {}", config.scenarios.len());
    for template in &config.scenarios {
        println!(
            "    {:<24} {:>6} blocks  {:<6}  {}",
            template.id,
            template.span(),
            config.mode_of(template).to_string(),
            template.description
        );
    }
    println!();
}

async fn run_campaign(args: &RunArgs) -> Result<i32> {
    let config = CampaignConfig::from_cli(args).context("Failed to load campaign configuration")?;
    print_config(&config);

    let source = RpcClient::new(&config.reference_url, &config.candidate_url, config.request_timeout)
        .context("Failed to create RPC client")?;
    let sink = CsvSink::open(&config.output).context("Failed to open results file")?;
    let summary_path = config.summary_json.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping campaign");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut runner = CampaignRunner::new(config, Arc::new(source), sink, shutdown_rx)
        .context("Failed to set up campaign")?
        .with_progress(!args.quiet);
    let outcome = runner.run().await;

    let summary = CampaignSummary::from(&outcome);
    print_summary(&summary);

    if let Some(path) = summary_path {
        summary
            .save_to_file(&path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Summary saved to {}", path.display());
    }

    Ok(outcome.exit_code())
}

fn print_scenarios(range_threshold: u64) -> Result<i32> {
    let battery = scenarios::default_battery();
    for template in &battery {
        eprintln!(
            "{:<24} {:>6} blocks  {}",
            template.id,
            template.span(),
            ProcessingMode::classify(template.span(), range_threshold)
        );
    }
    println!("{}", serde_json::to_string_pretty(&battery)?);
    Ok(0)
}

fn load_response(path: &Path) -> Result<EndpointResponse> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let latency = Duration::ZERO;
    Ok(match unwrap_envelope(&body).and_then(normalize) {
        Ok(logs) => EndpointResponse::Ok { logs, latency },
        Err(reason) => EndpointResponse::Err { reason, latency },
    })
}

fn compare_files(reference: &Path, candidate: &Path) -> Result<i32> {
    let reference = load_response(reference)?;
    let candidate = load_response(candidate)?;
    let status = compare(&reference, &candidate);

    let counts = |r: &EndpointResponse| {
        r.log_count().map(|c| c.to_string()).unwrap_or_else(|| "ERR".to_string())
    };
    println!("Reference logs: {}", counts(&reference));
    println!("Candidate logs: {}", counts(&candidate));

    if status == Status::Match {
        println!("Status: {}", status.as_str().bright_green().bold());
        Ok(0)
    } else {
        println!("Status: {}", status.as_str().bright_red().bold());
        if let Some(detail) = describe_divergence(&reference, &candidate) {
            println!("Detail: {}", detail);
        }
        Ok(1)
    }
}
