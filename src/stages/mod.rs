//! Pipeline stages.
//!
//! Four stages transform the job state in order: Research gathers
//! evidence, Draft writes, Verify fact-checks (and can send the job back
//! to Draft), Refine polishes. Each stage owns its prompt construction and
//! maps collaborator failures to an outcome; none of them touch the
//! network or filesystem directly.

pub mod draft;
pub mod refine;
pub mod research;
pub mod verify;

use async_trait::async_trait;

use crate::domain::{JobState, StageStatus};

pub use draft::{fallback_skeleton, DraftStage};
pub use refine::RefineStage;
pub use research::ResearchStage;
pub use verify::VerifyStage;

/// How a stage execution ended.
///
/// `Ok` proceeds. `Degraded` proceeds on a safe fallback and is surfaced in
/// the job metadata. `Fatal` aborts the job immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Ok,

    Degraded { note: String },

    Fatal { reason: String },
}

impl StageOutcome {
    pub fn degraded(note: impl Into<String>) -> Self {
        Self::Degraded { note: note.into() }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal { reason: reason.into() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Flat label for stage records.
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Ok => StageStatus::Ok,
            Self::Degraded { .. } => StageStatus::Degraded,
            Self::Fatal { .. } => StageStatus::Fatal,
        }
    }
}

/// One pipeline step.
///
/// Stages take the state by value and hand back the updated value; the
/// orchestrator owns the authoritative instance between calls.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, state: JobState) -> (JobState, StageOutcome);
}
