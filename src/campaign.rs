//! Campaign runner: iterations over the scenario battery with a stop policy

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::compare::{compare, describe_divergence};
use crate::config::CampaignConfig;
use crate::error::{ComparatorError, FailureReason, Result};
use crate::query::{ProcessingMode, QuerySpec, ScenarioTemplate};
use crate::rpc::{LogSource, Side};
use crate::sink::{ResultSink, Tally};
use crate::stats::CampaignStatistics;
use crate::types::{ComparisonResult, IterationFailure, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Stop-on-error tripped on this iteration
    IssuesFound { iteration: u64 },
    /// Operator requested shutdown
    Interrupted,
    /// The result sink rejected a record during this iteration
    SinkFailed { iteration: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CampaignPhase {
    Idle,
    Running { iteration: u64 },
    Stopped(StopReason),
    Completed,
}

/// Counters owned by the control task, updated only between iterations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignState {
    pub iterations_completed: u64,
    pub comparisons: u64,
    pub errors: u64,
    pub mismatches: u64,
    pub iteration_failures: u64,
}

impl CampaignState {
    pub fn has_issues(&self) -> bool {
        self.errors > 0 || self.mismatches > 0
    }
}

/// What the stop policy decided after an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Complete,
    Stop(StopReason),
}

/// Stop policy, evaluated once iteration `iteration` is fully recorded
pub fn decide(config: &CampaignConfig, iteration: u64, issues: u64) -> Decision {
    if config.stop_on_error && issues > 0 {
        Decision::Stop(StopReason::IssuesFound { iteration })
    } else if config.is_bounded() && iteration >= config.iterations {
        Decision::Complete
    } else {
        Decision::Continue
    }
}

enum IterationOutcome {
    Completed(Vec<ComparisonResult>),
    Failed(IterationFailure),
}

/// Final state of a campaign, input to the summary report
#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    pub phase: CampaignPhase,
    pub state: CampaignState,
    pub tally: Tally,
    pub statistics: CampaignStatistics,
    pub output: Option<PathBuf>,
    pub elapsed: Duration,
}

impl CampaignOutcome {
    /// 0 for a clean run (including a clean interrupt), 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.phase {
            CampaignPhase::Stopped(StopReason::IssuesFound { .. } | StopReason::SinkFailed { .. }) => 1,
            _ if self.state.has_issues() => 1,
            _ => 0,
        }
    }
}

pub struct CampaignRunner<K: ResultSink> {
    config: CampaignConfig,
    source: Arc<dyn LogSource>,
    sink: K,
    shutdown: watch::Receiver<bool>,
    state: CampaignState,
    statistics: CampaignStatistics,
    phase: CampaignPhase,
    show_progress: bool,
}

impl<K: ResultSink> CampaignRunner<K> {
    pub fn new(
        config: CampaignConfig,
        source: Arc<dyn LogSource>,
        sink: K,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            source,
            sink,
            shutdown,
            state: CampaignState::default(),
            statistics: CampaignStatistics::new()?,
            phase: CampaignPhase::Idle,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn phase(&self) -> CampaignPhase {
        self.phase
    }

    pub fn state(&self) -> &CampaignState {
        &self.state
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Drive the campaign to a terminal phase.
    ///
    /// A shutdown signal abandons the in-flight iteration; the outcome then
    /// reflects the last fully recorded one. A sink failure also ends the
    /// campaign, with the state covering exactly the records the sink took.
    pub async fn run(&mut self) -> CampaignOutcome {
        let started = Instant::now();
        let mut shutdown = self.shutdown.clone();

        info!(
            scenarios = self.config.scenarios.len(),
            iterations = self.config.iterations,
            stop_on_error = self.config.stop_on_error,
            "Starting comparison campaign"
        );

        let mut iteration = 0;
        let terminal = loop {
            if *shutdown.borrow() {
                break CampaignPhase::Stopped(StopReason::Interrupted);
            }

            iteration += 1;
            self.phase = CampaignPhase::Running { iteration };

            let outcome = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    warn!(iteration, "Interrupted, abandoning in-flight iteration");
                    break CampaignPhase::Stopped(StopReason::Interrupted);
                }
                outcome = self.run_iteration(iteration) => outcome,
            };

            let issues = match self.record(outcome) {
                Ok(issues) => issues,
                Err(e) => {
                    error!(iteration, error = %e, "Result sink failed, stopping campaign");
                    break CampaignPhase::Stopped(StopReason::SinkFailed { iteration });
                }
            };

            match decide(&self.config, iteration, issues) {
                Decision::Stop(reason) => {
                    warn!(iteration, issues, "Stop on error triggered");
                    break CampaignPhase::Stopped(reason);
                }
                Decision::Complete => break CampaignPhase::Completed,
                Decision::Continue => {}
            }

            debug!(delay = ?self.config.delay, "Waiting for next iteration");
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    break CampaignPhase::Stopped(StopReason::Interrupted);
                }
                _ = tokio::time::sleep(self.config.delay) => {}
            }
        };

        self.phase = terminal;
        info!(phase = ?terminal, iterations = self.state.iterations_completed, "Campaign finished");

        CampaignOutcome {
            phase: terminal,
            state: self.state.clone(),
            tally: self.sink.tally().clone(),
            statistics: self.statistics.clone(),
            output: self.sink.location().map(PathBuf::from),
            elapsed: started.elapsed(),
        }
    }

    async fn run_iteration(&self, iteration: u64) -> IterationOutcome {
        let latest_block = match self.resolve_latest_block().await {
            Ok(block) => block,
            Err(reason) => {
                return IterationOutcome::Failed(IterationFailure {
                    iteration,
                    timestamp: Utc::now(),
                    reason,
                })
            }
        };

        let mut planned = Vec::with_capacity(self.config.scenarios.len());
        for template in &self.config.scenarios {
            match template.resolve(latest_block) {
                Ok(query) => planned.push((template.clone(), self.config.mode_of(template), query)),
                Err(e) => {
                    return IterationOutcome::Failed(IterationFailure {
                        iteration,
                        timestamp: Utc::now(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        info!(iteration, latest_block, scenarios = planned.len(), "Running iteration");
        let progress = self.progress_bar(planned.len() as u64, iteration);

        let mut results: Vec<(usize, ComparisonResult)> = stream::iter(planned.into_iter().enumerate())
            .map(|(index, (template, mode, query))| {
                let progress = &progress;
                async move {
                    let result = self.run_scenario(iteration, &template, mode, query).await;
                    progress.inc(1);
                    (index, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        progress.finish_and_clear();
        results.sort_by_key(|(index, _)| *index);
        IterationOutcome::Completed(results.into_iter().map(|(_, result)| result).collect())
    }

    /// Lower of the two heads, so every window exists on both nodes
    async fn resolve_latest_block(&self) -> std::result::Result<u64, String> {
        let (reference, candidate) = tokio::join!(
            self.source.block_number(Side::Reference),
            self.source.block_number(Side::Candidate),
        );
        let reference = reference.map_err(|e| format!("{}: {}", Side::Reference, e))?;
        let candidate = candidate.map_err(|e| format!("{}: {}", Side::Candidate, e))?;
        if reference != candidate {
            debug!(reference, candidate, "Endpoint heads differ");
        }
        Ok(reference.min(candidate))
    }

    async fn run_scenario(
        &self,
        iteration: u64,
        template: &ScenarioTemplate,
        mode: ProcessingMode,
        query: QuerySpec,
    ) -> ComparisonResult {
        let timestamp = Utc::now();
        let (reference, candidate) = tokio::join!(
            self.source.get_logs(Side::Reference, &query),
            self.source.get_logs(Side::Candidate, &query),
        );
        let reference = reference.into_endpoint_response();
        let candidate = candidate.into_endpoint_response();
        let status = compare(&reference, &candidate);

        if status.is_issue() {
            let failure = reference
                .failure()
                .or_else(|| candidate.failure())
                .map(FailureReason::kind)
                .unwrap_or("none");
            warn!(
                iteration,
                scenario = %template.id,
                %mode,
                from_block = query.from_block(),
                to_block = query.to_block(),
                %status,
                failure,
                detail = %describe_divergence(&reference, &candidate).unwrap_or_default(),
                "Scenario diverged"
            );
        } else {
            debug!(
                iteration,
                scenario = %template.id,
                %mode,
                logs = reference.log_count().unwrap_or_default(),
                "Scenario matched"
            );
        }

        ComparisonResult {
            iteration,
            timestamp,
            scenario_id: template.id.clone(),
            description: template.description.clone(),
            mode,
            query,
            reference,
            candidate,
            status,
        }
    }

    /// Persist one iteration and fold what the sink accepted into the
    /// campaign state; returns the number of issues it contained
    fn record(&mut self, outcome: IterationOutcome) -> Result<u64> {
        let issues = match outcome {
            IterationOutcome::Completed(results) => {
                let mut accepted = 0u64;
                let mut errors = 0;
                let mut mismatches = 0;
                let mut sink_error: Option<ComparatorError> = None;
                for result in &results {
                    if let Err(e) = self.sink.record(result) {
                        sink_error = Some(e);
                        break;
                    }
                    accepted += 1;
                    self.statistics.record(result);
                    match result.status {
                        Status::Error => errors += 1,
                        s if s.is_mismatch() => mismatches += 1,
                        _ => {}
                    }
                }

                self.state.comparisons += accepted;
                self.state.errors += errors;
                self.state.mismatches += mismatches;

                if let Some(e) = sink_error {
                    return Err(e);
                }

                info!(
                    iteration = results.first().map(|r| r.iteration).unwrap_or_default(),
                    comparisons = accepted,
                    matched = accepted - errors - mismatches,
                    mismatches,
                    errors,
                    "Iteration complete"
                );
                errors + mismatches
            }
            IterationOutcome::Failed(failure) => {
                error!(iteration = failure.iteration, reason = %failure.reason, "Iteration failed");
                self.sink.record_iteration_failure(&failure)?;
                self.state.errors += 1;
                self.state.iteration_failures += 1;
                1
            }
        };

        self.state.iterations_completed += 1;
        Ok(issues)
    }

    fn progress_bar(&self, len: u64, iteration: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░"),
        );
        progress.set_message(format!("iteration {}", iteration));
        progress
    }
}

/// Resolves once shutdown is requested; never if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
