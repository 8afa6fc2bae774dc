//! Draft stage: write the content from topic, requirements, and findings.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::{PromptSpec, TextGenerator};
use crate::domain::JobState;

use super::{Stage, StageOutcome};

/// Produces the draft text. Never fatal: when the generator is
/// unavailable the stage falls back to a deterministic templated skeleton
/// so downstream stages always have content to work with.
pub struct DraftStage {
    generator: Arc<dyn TextGenerator>,
}

impl DraftStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(state: &JobState) -> PromptSpec {
        let system = format!(
            "You are a content writer. Write in a {} style, targeting \
             about {} words. Output only the content itself.",
            state.style_hint, state.target_length
        );

        let mut user = format!("Write an article about: {}\n", state.topic);

        if !state.requirements.trim().is_empty() {
            let _ = write!(user, "\nRequirements:\n{}\n", state.requirements);
        }

        if !state.research_findings.is_empty() {
            user.push_str("\nGround the article in these findings:\n");
            for finding in &state.research_findings {
                let _ = writeln!(user, "- {} ({}): {}", finding.title, finding.source_ref, finding.snippet);
            }
        }

        // On a redraft, feed the fact-checker's objections back in.
        if !state.verify_issues.is_empty() {
            user.push_str("\nA previous draft was rejected. Fix these issues:\n");
            for issue in &state.verify_issues {
                let _ = writeln!(user, "- {}", issue);
            }
        }

        PromptSpec::new(system, user)
    }
}

/// Deterministic minimal draft used when the generator cannot produce
/// text. Built only from the immutable job inputs and findings, so a job
/// whose generator never recovers still terminates with predictable,
/// non-empty output.
pub fn fallback_skeleton(state: &JobState) -> String {
    let mut text = format!("# {}\n", state.topic);

    if !state.requirements.trim().is_empty() {
        let _ = write!(text, "\nScope: {}\n", state.requirements.trim());
    }

    if state.research_findings.is_empty() {
        let _ = write!(
            text,
            "\nAn overview of {} will be provided here once content generation is available.\n",
            state.topic
        );
    } else {
        text.push_str("\nKey points from research:\n");
        for finding in &state.research_findings {
            let _ = writeln!(text, "- {}: {}", finding.title, finding.snippet);
        }
    }

    text
}

#[async_trait]
impl Stage for DraftStage {
    fn name(&self) -> &'static str {
        "draft"
    }

    async fn execute(&self, mut state: JobState) -> (JobState, StageOutcome) {
        let spec = Self::prompt(&state);

        match self.generator.generate(spec).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(chars = text.len(), "draft generated");
                state.draft_text = Some(text);
                (state, StageOutcome::Ok)
            }
            Ok(_) => {
                warn!("generator returned empty draft, using fallback skeleton");
                state.draft_text = Some(fallback_skeleton(&state));
                (state, StageOutcome::degraded("empty draft, fallback skeleton used"))
            }
            Err(e) => {
                warn!(error = %e, "draft generation failed, using fallback skeleton");
                state.draft_text = Some(fallback_skeleton(&state));
                (
                    state,
                    StageOutcome::degraded(format!("draft generation failed: {}", e)),
                )
            }
        }
    }
}
