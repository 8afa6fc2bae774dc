//! draftmill - multi-stage content generation pipeline
//!
//! A topic moves through four ordered stages: Research gathers evidence,
//! Draft writes, Verify fact-checks, Refine polishes. Verify can reject a
//! draft and send the job back to Draft, bounded by a fixed retry limit;
//! when the bound is exhausted the job still completes, flagged as a
//! degraded success. Every non-aborted job terminates with non-empty
//! final text.
//!
//! # Architecture
//!
//! - `domain`: JobState, reports, and stage telemetry records
//! - `stages`: the four pipeline stages and the Stage contract
//! - `core`: the orchestrator state machine and cancellation
//! - `adapters`: collaborator traits and their HTTP/file implementations
//! - `cli`: command-line interface
//!
//! External collaborators (search, text generation, telemetry,
//! persistence) are injected once at process start; tests substitute
//! scripted doubles for deterministic runs.
//!
//! # Usage
//!
//! ```bash
//! # Generate content
//! draftmill generate "rust borrow checker" --length 800
//!
//! # Inspect a finished job
//! draftmill status <job-id>
//!
//! # List recent jobs
//! draftmill jobs
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod stages;

// Re-export main types at crate root for convenience
pub use adapters::{
    GeneratorError, JobStore, ObservabilitySink, PromptSpec, ResearchLookup, SearchError,
    TextGenerator,
};
pub use crate::core::{cancel_pair, CancelHandle, CancelToken, Orchestrator, RETRY_BOUND};
pub use domain::{Finding, JobReport, JobRequest, JobState, JobStatus, StageRecord, VerifyStatus};
pub use stages::{Stage, StageOutcome};
