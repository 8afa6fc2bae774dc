//! Pipeline orchestrator.
//!
//! Owns the stage graph and the authoritative JobState, executes stages in
//! order, evaluates the conditional edge after Verify, and enforces the
//! retry bound. Every job terminates: with a report carrying non-empty
//! final text, or aborted with an explicit reason.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{JobStore, ObservabilitySink, ResearchLookup, TextGenerator};
use crate::domain::{digest, preview, JobReport, JobRequest, JobState, StageRecord};
use crate::stages::{DraftStage, RefineStage, ResearchStage, Stage, StageOutcome, VerifyStage};

use super::cancel::CancelToken;

/// Maximum Draft/Verify retry cycles before the job is forced to
/// completion on the degraded path.
pub const RETRY_BOUND: u32 = 3;

/// Findings requested from the research lookup per job.
const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Characters of stage input/output kept on a stage record.
const RECORD_PREVIEW_CHARS: usize = 400;

/// Pipeline position of a job.
///
/// The conditional edge lives at `Verifying`: PASS moves forward, FAIL
/// loops back to `Drafting` until the retry bound forces `Refining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Researching,
    Drafting,
    Verifying,
    Refining,
    Done,
    Aborted,
}

/// The stage graph executor.
pub struct Orchestrator {
    research_stage: ResearchStage,
    draft_stage: DraftStage,
    verify_stage: VerifyStage,
    refine_stage: RefineStage,
    sink: Arc<dyn ObservabilitySink>,
    store: Option<Arc<dyn JobStore>>,
    timeout: Option<Duration>,
}

enum StageWait {
    Finished(JobState, StageOutcome),
    Cancelled,
    DeadlineExceeded,
}

impl Orchestrator {
    /// Wire the collaborators into the four stages.
    pub fn new(
        research: Arc<dyn ResearchLookup>,
        generator: Arc<dyn TextGenerator>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            research_stage: ResearchStage::new(research, DEFAULT_SEARCH_LIMIT),
            draft_stage: DraftStage::new(generator.clone()),
            verify_stage: VerifyStage::new(generator.clone()),
            refine_stage: RefineStage::new(generator),
            sink,
            store: None,
            timeout: None,
        }
    }

    /// Attach an optional job store. Execution succeeds even when the
    /// store errors or is absent.
    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a wall-clock deadline for each job.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override how many findings Research requests.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.research_stage.set_limit(limit);
        self
    }

    /// Run a job to its terminal report without external cancellation.
    pub async fn run(&self, request: JobRequest) -> JobReport {
        self.run_cancellable(request, CancelToken::never()).await
    }

    /// Run a job to its terminal report, aborting if `cancel` fires or the
    /// configured deadline passes. Cancelled jobs are not persisted as
    /// final.
    #[instrument(skip(self, request, cancel), fields(topic = %request.topic))]
    pub async fn run_cancellable(&self, request: JobRequest, cancel: CancelToken) -> JobReport {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(%job_id, "job started");

        if request.target_length == 0 {
            let report = aborted_report(
                job_id,
                &request.topic,
                0,
                started_at,
                "target_length must be greater than zero",
            );
            self.finalize(&report).await;
            return report;
        }

        if let Some(ref store) = self.store {
            if let Err(e) = store.create_job(job_id, &request).await {
                warn!(%job_id, error = %e, "job store create failed, continuing");
            }
        }

        let deadline = self.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut state = JobState::new(job_id, request);
        let mut phase = Phase::Researching;
        let mut degraded_stages: Vec<String> = Vec::new();

        let report = loop {
            let stage: &dyn Stage = match phase {
                Phase::Researching => &self.research_stage,
                Phase::Drafting => &self.draft_stage,
                Phase::Verifying => &self.verify_stage,
                Phase::Refining => &self.refine_stage,
                Phase::Done => {
                    break completed_report(&state, started_at, &degraded_stages);
                }
                Phase::Aborted => {
                    // Aborts break out of the loop directly; reaching the
                    // phase here would be a control-flow bug.
                    break aborted_report(
                        job_id,
                        &state.topic,
                        state.iteration_count,
                        started_at,
                        "internal: aborted phase re-entered",
                    );
                }
            };

            let stage_name = stage.name();
            let stage_input = record_input(stage_name, &state);
            let stage_start = Instant::now();

            let wait = tokio::select! {
                _ = cancel.cancelled() => StageWait::Cancelled,
                _ = deadline_sleep(deadline) => StageWait::DeadlineExceeded,
                finished = stage.execute(state.clone()) => {
                    let (next, outcome) = finished;
                    StageWait::Finished(next, outcome)
                }
            };

            let (next_state, outcome) = match wait {
                StageWait::Finished(next_state, outcome) => (next_state, outcome),
                StageWait::Cancelled => {
                    info!(%job_id, stage = stage_name, "job cancelled");
                    let report = aborted_report(
                        job_id,
                        &state.topic,
                        state.iteration_count,
                        started_at,
                        "job cancelled by caller",
                    );
                    // Partial results are discarded, not persisted as final.
                    return report;
                }
                StageWait::DeadlineExceeded => {
                    warn!(%job_id, stage = stage_name, "job deadline exceeded");
                    return aborted_report(
                        job_id,
                        &state.topic,
                        state.iteration_count,
                        started_at,
                        "job deadline exceeded",
                    );
                }
            };

            state = next_state;

            let duration_ms = stage_start.elapsed().as_millis() as u64;
            self.emit_record(stage_name, stage_input, &state, &outcome, duration_ms)
                .await;

            match outcome {
                StageOutcome::Fatal { reason } => {
                    warn!(%job_id, stage = stage_name, %reason, "stage fatal, aborting job");
                    let report = aborted_report(
                        job_id,
                        &state.topic,
                        state.iteration_count,
                        started_at,
                        &reason,
                    );
                    self.finalize(&report).await;
                    return report;
                }
                StageOutcome::Degraded { note } => {
                    info!(%job_id, stage = stage_name, %note, "stage degraded, continuing");
                    let name = stage_name.to_string();
                    if !degraded_stages.contains(&name) {
                        degraded_stages.push(name);
                    }
                }
                StageOutcome::Ok => {}
            }

            phase = match phase {
                Phase::Researching => Phase::Drafting,
                Phase::Drafting => Phase::Verifying,
                Phase::Verifying => {
                    let next = next_after_verify(state.verify_passed(), state.iteration_count);
                    if next == Phase::Drafting {
                        // The one place the counter moves: Draft is about
                        // to re-execute after a FAIL.
                        state.iteration_count += 1;
                        info!(
                            %job_id,
                            iteration = state.iteration_count,
                            "verify failed, redrafting"
                        );
                    } else if !state.verify_passed() {
                        info!(%job_id, "retry bound exhausted, completing degraded");
                    }
                    next
                }
                Phase::Refining => Phase::Done,
                Phase::Done | Phase::Aborted => phase,
            };
        };

        info!(%job_id, iterations = report.iteration_count, "job completed");
        self.finalize(&report).await;

        report
    }

    /// Record one stage execution; sink failures are logged and swallowed.
    async fn emit_record(
        &self,
        stage_name: &str,
        input: String,
        state: &JobState,
        outcome: &StageOutcome,
        duration_ms: u64,
    ) {
        let mut record = StageRecord::new(
            state.job_id,
            stage_name,
            preview(&input, RECORD_PREVIEW_CHARS),
            record_output(stage_name, state),
            outcome.status(),
        )
        .with_duration(duration_ms)
        .with_metric("input_digest", digest(&input))
        .with_metric("iteration", state.iteration_count);

        record = match stage_name {
            "research" => record.with_metric("finding_count", state.research_findings.len() as u64),
            "verify" => record.with_metric("issue_count", state.verify_issues.len() as u64),
            "refine" => {
                let words = state
                    .final_text
                    .as_deref()
                    .map(|t| t.split_whitespace().count() as u64)
                    .unwrap_or(0);
                record.with_metric("word_count", words)
            }
            _ => record,
        };

        if let Err(e) = self.sink.record(record).await {
            warn!(stage = stage_name, error = %e, "stage record dropped");
        }
    }

    async fn finalize(&self, report: &JobReport) {
        if let Some(ref store) = self.store {
            if let Err(e) = store.finalize_job(report).await {
                warn!(job_id = %report.job_id, error = %e, "job store finalize failed");
            }
        }
    }
}

/// The conditional edge: where the job goes after a Verify execution.
fn next_after_verify(verify_passed: bool, iteration_count: u32) -> Phase {
    if verify_passed {
        Phase::Refining
    } else if iteration_count < RETRY_BOUND {
        Phase::Drafting
    } else {
        // Bound exhausted: complete anyway, flagged as degraded success.
        Phase::Refining
    }
}

async fn deadline_sleep(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The primary input a stage works from, for its record.
fn record_input(stage_name: &str, state: &JobState) -> String {
    match stage_name {
        "research" | "draft" => state.topic.clone(),
        "verify" => state.draft_text.clone().unwrap_or_default(),
        "refine" => state.best_text().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

/// The primary output a stage produced, for its record.
fn record_output(stage_name: &str, state: &JobState) -> String {
    match stage_name {
        "research" => format!("{} findings", state.research_findings.len()),
        "draft" => preview(state.draft_text.as_deref().unwrap_or_default(), RECORD_PREVIEW_CHARS),
        "verify" => {
            let verdict = match state.verify_status {
                Some(status) if state.verify_passed() => format!("{:?}", status),
                Some(status) => format!("{:?} ({} issues)", status, state.verify_issues.len()),
                None => "no verdict".to_string(),
            };
            verdict.to_lowercase()
        }
        "refine" => preview(state.final_text.as_deref().unwrap_or_default(), RECORD_PREVIEW_CHARS),
        _ => String::new(),
    }
}

fn completed_report(
    state: &JobState,
    started_at: chrono::DateTime<Utc>,
    degraded_stages: &[String],
) -> JobReport {
    use crate::domain::JobStatus;

    let clean = state.verify_passed() && degraded_stages.is_empty();
    let status = if clean {
        JobStatus::Success
    } else {
        JobStatus::SuccessDegraded
    };

    let mut metadata = state.final_metadata.clone();
    metadata.insert("degraded".to_string(), Value::from(!clean));
    metadata.insert(
        "degraded_stages".to_string(),
        Value::from(degraded_stages.to_vec()),
    );
    metadata.insert(
        "verify_passed".to_string(),
        Value::from(state.verify_passed()),
    );
    metadata.insert(
        "iteration_count".to_string(),
        Value::from(state.iteration_count),
    );
    if !state.verify_issues.is_empty() {
        metadata.insert(
            "verify_issues".to_string(),
            Value::from(state.verify_issues.clone()),
        );
    }

    JobReport {
        job_id: state.job_id,
        topic: state.topic.clone(),
        status,
        final_text: state.final_text.clone(),
        metadata,
        iteration_count: state.iteration_count,
        started_at,
        completed_at: Utc::now(),
    }
}

fn aborted_report(
    job_id: Uuid,
    topic: &str,
    iteration_count: u32,
    started_at: chrono::DateTime<Utc>,
    reason: &str,
) -> JobReport {
    use crate::domain::JobStatus;

    JobReport {
        job_id,
        topic: topic.to_string(),
        status: JobStatus::Aborted {
            reason: reason.to_string(),
        },
        final_text: None,
        metadata: Default::default(),
        iteration_count,
        started_at,
        completed_at: Utc::now(),
    }
}
