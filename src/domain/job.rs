//! Job state and terminal reports.
//!
//! A JobState is the single value threaded through every pipeline stage.
//! It is statically shaped: fields a stage has not produced yet are
//! explicit `Option`s rather than absent map keys, so a typo'd field
//! access is a compile error instead of a silent default.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Submission input for a content-generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Subject to write about (required, non-empty)
    pub topic: String,

    /// Free-form constraints on the content (may be empty)
    #[serde(default)]
    pub requirements: String,

    /// Writing style, e.g. "professional", "casual"
    #[serde(default = "default_style")]
    pub style_hint: String,

    /// Target length in words (must be > 0)
    #[serde(default = "default_target_length")]
    pub target_length: u32,
}

fn default_style() -> String {
    "professional".to_string()
}

fn default_target_length() -> u32 {
    1000
}

impl JobRequest {
    /// Create a request with default style and length.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            requirements: String::new(),
            style_hint: default_style(),
            target_length: default_target_length(),
        }
    }

    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = requirements.into();
        self
    }

    pub fn with_style(mut self, style_hint: impl Into<String>) -> Self {
        self.style_hint = style_hint.into();
        self
    }

    pub fn with_target_length(mut self, target_length: u32) -> Self {
        self.target_length = target_length;
        self
    }
}

/// A single piece of external research evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Short title of the source
    pub title: String,

    /// Relevant excerpt
    pub snippet: String,

    /// Where the evidence came from (URL or citation)
    pub source_ref: String,
}

/// Verdict from the Verify stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Pass,
    Fail,
}

/// The job state threaded through the pipeline.
///
/// The orchestrator exclusively owns the authoritative instance; stages
/// receive it by value and return the updated value. Immutable inputs sit
/// at the top, stage outputs below in pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Unique identifier for this job
    pub job_id: Uuid,

    /// Subject to write about (immutable input)
    pub topic: String,

    /// Free-form constraints (immutable input, may be empty)
    pub requirements: String,

    /// Writing style (immutable input)
    pub style_hint: String,

    /// Target length in words (immutable input, > 0)
    pub target_length: u32,

    /// Evidence gathered by Research; set once, read-only afterward
    pub research_findings: Vec<Finding>,

    /// Current draft; overwritten on each retry cycle
    pub draft_text: Option<String>,

    /// Draft after fact-checking (corrected or passed through)
    pub verified_text: Option<String>,

    /// Verdict from the most recent Verify execution
    pub verify_status: Option<VerifyStatus>,

    /// Issues flagged by the most recent Verify execution
    pub verify_issues: Vec<String>,

    /// Number of times Draft re-executed after a FAIL verdict; never resets
    pub iteration_count: u32,

    /// Polished output; set exactly once by Refine
    pub final_text: Option<String>,

    /// Metadata attached by Refine (word count, style, degradation flags)
    pub final_metadata: BTreeMap<String, Value>,
}

impl JobState {
    /// Create the initial state for a request.
    pub fn new(job_id: Uuid, request: JobRequest) -> Self {
        Self {
            job_id,
            topic: request.topic,
            requirements: request.requirements,
            style_hint: request.style_hint,
            target_length: request.target_length,
            research_findings: Vec::new(),
            draft_text: None,
            verified_text: None,
            verify_status: None,
            verify_issues: Vec::new(),
            iteration_count: 0,
            final_text: None,
            final_metadata: BTreeMap::new(),
        }
    }

    /// The best text produced so far: verified text if non-empty, else the
    /// draft. Refine uses this as its input and as its failure fallback.
    pub fn best_text(&self) -> Option<&str> {
        non_empty(self.verified_text.as_deref()).or_else(|| non_empty(self.draft_text.as_deref()))
    }

    /// Whether the last verify verdict was a pass.
    pub fn verify_passed(&self) -> bool {
        self.verify_status == Some(VerifyStatus::Pass)
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Terminal status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum JobStatus {
    /// Completed with a passing fact-check
    Success,

    /// Completed, but fact-checking never fully passed or a stage
    /// fell back to degraded output
    SuccessDegraded,

    /// A stage reported a fatal condition or the job was cancelled
    Aborted { reason: String },
}

impl JobStatus {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Terminal result of a job, handed to the caller and the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,

    pub topic: String,

    pub status: JobStatus,

    /// Non-empty for every non-aborted job
    pub final_text: Option<String>,

    /// Word count, style, verify outcome, degradation flags
    pub metadata: BTreeMap<String, Value>,

    pub iteration_count: u32,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl JobReport {
    /// Whether the job produced usable output.
    pub fn is_success(&self) -> bool {
        !self.status.is_aborted()
    }
}
