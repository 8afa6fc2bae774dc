//! Research stage: gather external evidence for the topic.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::ResearchLookup;
use crate::domain::JobState;

use super::{Stage, StageOutcome};

/// Looks up evidence for the topic before any text is written.
///
/// Research is optional context: a lookup failure yields empty findings
/// and the pipeline continues. The one hard requirement checked here is a
/// non-empty topic.
pub struct ResearchStage {
    lookup: Arc<dyn ResearchLookup>,
    limit: usize,
}

impl ResearchStage {
    pub fn new(lookup: Arc<dyn ResearchLookup>, limit: usize) -> Self {
        Self { lookup, limit }
    }

    /// Change how many findings are requested per job.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> &'static str {
        "research"
    }

    async fn execute(&self, mut state: JobState) -> (JobState, StageOutcome) {
        if state.topic.trim().is_empty() {
            return (
                state,
                StageOutcome::fatal("topic is empty: a non-empty topic is required"),
            );
        }

        let findings = match self.lookup.search(&state.topic, self.limit).await {
            Ok(findings) => {
                info!(count = findings.len(), "research lookup completed");
                findings
            }
            Err(e) => {
                // Absence of evidence is a valid outcome; the draft just
                // gets less grounding and Verify switches to lenient mode.
                warn!(error = %e, "research lookup failed, continuing without findings");
                Vec::new()
            }
        };

        state.research_findings = findings;

        (state, StageOutcome::Ok)
    }
}
