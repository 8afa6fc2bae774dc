//! Refine stage: polish the verified text into the final output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::{PromptSpec, TextGenerator};
use crate::domain::JobState;

use super::{draft::fallback_skeleton, Stage, StageOutcome};

/// Polishes the best available upstream text toward the requested style
/// and length, and stamps the final metadata.
///
/// Never fatal: if the generator fails, the stage falls back to the
/// verified text, then the draft. A missing upstream text is a bug
/// elsewhere in the pipeline; this stage still degrades gracefully by
/// substituting the templated skeleton.
pub struct RefineStage {
    generator: Arc<dyn TextGenerator>,
}

impl RefineStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(state: &JobState, text: &str) -> PromptSpec {
        let system = format!(
            "You are an editor. Polish the text below for flow and clarity \
             in a {} style, targeting about {} words. Keep every factual \
             statement unchanged. Output only the polished text.",
            state.style_hint, state.target_length
        );

        PromptSpec::new(system, text.to_string())
    }

    fn stamp_metadata(state: &mut JobState, final_text: &str) {
        let word_count = final_text.split_whitespace().count();

        state.final_metadata.insert("word_count".to_string(), word_count.into());
        state
            .final_metadata
            .insert("style".to_string(), state.style_hint.clone().into());
        state
            .final_metadata
            .insert("status".to_string(), "completed".into());
    }
}

#[async_trait]
impl Stage for RefineStage {
    fn name(&self) -> &'static str {
        "refine"
    }

    async fn execute(&self, mut state: JobState) -> (JobState, StageOutcome) {
        // Best non-empty upstream text: verified, then draft. The guard
        // against a fully empty pipeline substitutes the skeleton.
        let (upstream, upstream_missing) = match state.best_text() {
            Some(text) => (text.to_string(), false),
            None => (fallback_skeleton(&state), true),
        };

        let (final_text, outcome) = match self.generator.generate(Self::prompt(&state, &upstream)).await
        {
            Ok(polished) if !polished.trim().is_empty() => {
                info!(chars = polished.len(), "refine completed");
                (polished, StageOutcome::Ok)
            }
            Ok(_) => {
                warn!("refine returned empty text, keeping upstream text");
                (
                    upstream,
                    StageOutcome::degraded("empty polish result, upstream text kept"),
                )
            }
            Err(e) => {
                warn!(error = %e, "refine generation failed, keeping upstream text");
                (
                    upstream,
                    StageOutcome::degraded(format!("polish failed: {}", e)),
                )
            }
        };

        Self::stamp_metadata(&mut state, &final_text);
        state.final_text = Some(final_text);

        let outcome = if upstream_missing {
            StageOutcome::degraded("no upstream text, skeleton substituted")
        } else {
            outcome
        };

        (state, outcome)
    }
}
