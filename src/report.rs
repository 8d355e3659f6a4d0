//! Final campaign summary

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::campaign::{CampaignOutcome, CampaignPhase, CampaignState, StopReason};
use crate::error::Result;
use crate::rpc::Side;
use crate::sink::Tally;
use crate::query::ProcessingMode;
use crate::stats::LatencySummary;
use crate::types::Status;

/// Serializable form of a [`CampaignOutcome`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub phase: CampaignPhase,
    pub state: CampaignState,
    pub tally: Tally,
    pub reference_latency: LatencySummary,
    pub candidate_latency: LatencySummary,
    pub output: Option<PathBuf>,
    pub elapsed_secs: f64,
    pub exit_code: i32,
}

impl From<&CampaignOutcome> for CampaignSummary {
    fn from(outcome: &CampaignOutcome) -> Self {
        Self {
            phase: outcome.phase,
            state: outcome.state.clone(),
            tally: outcome.tally.clone(),
            reference_latency: outcome.statistics.side(Side::Reference).summary(),
            candidate_latency: outcome.statistics.side(Side::Candidate).summary(),
            output: outcome.output.clone(),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            exit_code: outcome.exit_code(),
        }
    }
}

impl CampaignSummary {
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn describe_phase(phase: &CampaignPhase) -> String {
    match phase {
        CampaignPhase::Completed => "completed".to_string(),
        CampaignPhase::Stopped(StopReason::IssuesFound { iteration }) => {
            format!("stopped on error in iteration {}", iteration)
        }
        CampaignPhase::Stopped(StopReason::Interrupted) => "interrupted".to_string(),
        CampaignPhase::Stopped(StopReason::SinkFailed { iteration }) => {
            format!("stopped: result sink failed in iteration {}", iteration)
        }
        CampaignPhase::Running { iteration } => format!("running iteration {}", iteration),
        CampaignPhase::Idle => "idle".to_string(),
    }
}

pub fn print_summary(summary: &CampaignSummary) {
    println!();
    println!("{}", "═══════════════════════════════════════".bright_cyan());
    println!("{}", "eth_getLogs Comparison Summary".bright_green().bold());
    println!("{}", "═══════════════════════════════════════".bright_cyan());
    println!();

    println!("{}", "Campaign:".bright_yellow());
    println!("  Result: {}", describe_phase(&summary.phase));
    println!("  Total Duration: {:.2}s", summary.elapsed_secs);
    println!("  Total Iterations: {}", summary.state.iterations_completed);
    println!("  Comparisons: {}", summary.state.comparisons);
    if let Some(output) = &summary.output {
        println!("  Results File: {}", output.display());
    }
    println!();

    println!("{}", "Status Counts:".bright_yellow());
    for status in Status::ALL {
        let count = summary.tally.count(status);
        let line = format!("  {:<17} {}", status.as_str(), count);
        if status.is_issue() && count > 0 {
            println!("{}", line.bright_red());
        } else {
            println!("{}", line);
        }
    }
    for mode in [ProcessingMode::Cached, ProcessingMode::Range] {
        let issues = summary.tally.issues_in(mode);
        if issues > 0 {
            println!("{}", format!("  Issues in {} mode: {}", mode, issues).bright_red());
        }
    }
    if summary.tally.iteration_failures > 0 {
        println!(
            "{}",
            format!("  Failed iterations: {}", summary.tally.iteration_failures).bright_red()
        );
    }
    println!();

    for (label, latency) in [
        ("Reference Latency:", &summary.reference_latency),
        ("Candidate Latency:", &summary.candidate_latency),
    ] {
        println!("{}", label.bright_yellow());
        println!("  Requests: {} ok, {} failed", latency.samples, latency.failures);
        println!("  Average: {:.2}ms", latency.avg_ms);
        println!("  P50: {:.2}ms  P95: {:.2}ms  P99: {:.2}ms  Max: {:.2}ms",
            latency.p50_ms, latency.p95_ms, latency.p99_ms, latency.max_ms
        );
        println!();
    }

    if summary.exit_code == 0 {
        println!("{}", "No divergence found".bright_green().bold());
    } else {
        println!(
            "{}",
            format!(
                "{} mismatches, {} errors",
                summary.state.mismatches, summary.state.errors
            )
            .bright_red()
            .bold()
        );
    }
    println!("{}", "═══════════════════════════════════════".bright_cyan());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::CampaignStatistics;
    use std::time::Duration;

    fn outcome(phase: CampaignPhase, errors: u64) -> CampaignOutcome {
        let mut tally = Tally::default();
        tally.add(Status::Match);
        CampaignOutcome {
            phase,
            state: CampaignState { iterations_completed: 2, comparisons: 1, errors, ..Default::default() },
            tally,
            statistics: CampaignStatistics::new().unwrap(),
            output: Some(PathBuf::from("results.csv")),
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_describe_phase() {
        assert_eq!(describe_phase(&CampaignPhase::Completed), "completed");
        assert_eq!(
            describe_phase(&CampaignPhase::Stopped(StopReason::IssuesFound { iteration: 4 })),
            "stopped on error in iteration 4"
        );
        assert_eq!(describe_phase(&CampaignPhase::Stopped(StopReason::Interrupted)), "interrupted");
        assert_eq!(
            describe_phase(&CampaignPhase::Stopped(StopReason::SinkFailed { iteration: 2 })),
            "stopped: result sink failed in iteration 2"
        );
    }

    #[test]
    fn test_summary_json() {
        let summary = CampaignSummary::from(&outcome(CampaignPhase::Completed, 0));
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["phase"]["phase"], "completed");
        assert_eq!(value["state"]["iterations_completed"], 2);
        assert_eq!(value["tally"]["by_status"]["MATCH"], 1);
        assert_eq!(value["exit_code"], 0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        summary.save_to_file(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"elapsed_secs\": 3.0"));
    }

    #[test]
    fn test_summary_exit_code_follows_outcome() {
        let summary = CampaignSummary::from(&outcome(CampaignPhase::Stopped(StopReason::Interrupted), 1));
        assert_eq!(summary.exit_code, 1);
    }
}
