//! Collaborator interfaces for external systems.
//!
//! The pipeline core never talks to the outside world directly: research
//! lookup, text generation, telemetry, and persistence are all reached
//! through the traits below, injected once at process start. Tests swap in
//! scripted doubles.

pub mod generator;
pub mod search;
pub mod sink;
pub mod store;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Finding, JobReport, JobRequest, StageRecord};

// Re-export the production implementations
pub use generator::{HttpGenerator, RetryPolicy};
pub use search::HttpSearch;
pub use sink::JsonlSink;
pub use store::FileJobStore;

/// A structured text-generation request.
///
/// Built by each stage, opaque to the orchestrator. The shape follows a
/// chat-completion call: a system framing plus a user payload.
#[derive(Debug, Clone, Serialize)]
pub struct PromptSpec {
    /// Role/persona framing for the generation
    pub system: String,

    /// The task payload
    pub user: String,

    /// Maximum completion length in tokens
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl PromptSpec {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Errors from a text-generation collaborator.
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Transport(String),

    #[error("generator returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generator returned an empty completion")]
    EmptyCompletion,
}

/// Errors from a research-lookup collaborator.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(String),

    #[error("search returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("search response malformed: {0}")]
    Malformed(String),
}

/// External evidence lookup. Failures are caught at the Research stage
/// boundary; absent findings are a valid outcome.
#[async_trait]
pub trait ResearchLookup: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Finding>, SearchError>;
}

/// Text generation, used by Draft, Verify's correction step, and Refine.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, spec: PromptSpec) -> Result<String, GeneratorError>;
}

/// Telemetry sink for stage execution records. Must tolerate concurrent
/// writers from independent jobs; record failures never fail a job.
#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn record(&self, record: StageRecord) -> anyhow::Result<()>;
}

/// Optional job persistence. The orchestrator runs to completion even when
/// no store is configured or the store errors.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a newly submitted job.
    async fn create_job(&self, job_id: Uuid, request: &JobRequest) -> anyhow::Result<()>;

    /// Persist the terminal report for a job.
    async fn finalize_job(&self, report: &JobReport) -> anyhow::Result<()>;

    /// Load the terminal report for a job, if it finished.
    async fn load_job(&self, job_id: Uuid) -> anyhow::Result<Option<JobReport>>;

    /// List known jobs, most recent first.
    async fn list_jobs(&self) -> anyhow::Result<Vec<JobReport>>;
}
