//! Verify stage: fact-check the draft against the research findings.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::adapters::{PromptSpec, TextGenerator};
use crate::domain::{JobState, VerifyStatus};

use super::{Stage, StageOutcome};

/// Fact-checks the draft and produces the verdict that drives the retry
/// edge.
///
/// With findings present the check is strict: any claim contradicting a
/// finding fails the draft. Without findings the check is lenient and only
/// internal self-contradictions count. The claim matching itself lives in
/// the generator prompt and the verdict format below; swapping it out does
/// not touch the orchestrator.
pub struct VerifyStage {
    generator: Arc<dyn TextGenerator>,
}

/// Verdict format requested from the generator.
#[derive(Debug, Deserialize)]
struct Verdict {
    status: String,

    #[serde(default)]
    issues: Vec<String>,

    #[serde(default)]
    corrected_text: Option<String>,
}

impl VerifyStage {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn prompt(state: &JobState, draft: &str) -> PromptSpec {
        let system = "You are a fact-checker. Respond with a single JSON object: \
                      {\"status\": \"pass\"|\"fail\", \"issues\": [..], \
                      \"corrected_text\": \"..\"}. Leave corrected_text empty when \
                      the draft needs no changes."
            .to_string();

        let mut user = String::new();

        if state.research_findings.is_empty() {
            user.push_str(
                "No external findings are available. Check the draft ONLY for \
                 internal self-contradictions; do not fail it for unsourced claims.\n",
            );
        } else {
            user.push_str(
                "Check every claim in the draft against the findings below. \
                 Fail the draft if any claim contradicts a finding.\n\nFindings:\n",
            );
            for finding in &state.research_findings {
                let _ = writeln!(user, "- {} ({}): {}", finding.title, finding.source_ref, finding.snippet);
            }
        }

        let _ = write!(user, "\nDraft:\n{}", draft);

        PromptSpec::new(system, user).with_temperature(0.0)
    }

    /// Extract a Verdict from generator output, tolerating code fences and
    /// prose around the JSON object.
    fn parse_verdict(response: &str) -> Option<Verdict> {
        let start = response.find('{')?;
        let end = response.rfind('}')?;
        if end < start {
            return None;
        }

        let verdict: Verdict = serde_json::from_str(&response[start..=end]).ok()?;

        match verdict.status.as_str() {
            "pass" | "fail" => Some(verdict),
            _ => None,
        }
    }
}

#[async_trait]
impl Stage for VerifyStage {
    fn name(&self) -> &'static str {
        "verify"
    }

    async fn execute(&self, mut state: JobState) -> (JobState, StageOutcome) {
        let Some(draft) = state.draft_text.clone().filter(|d| !d.trim().is_empty()) else {
            // Upstream contract violation; fail the iteration rather than
            // inventing content to verify.
            state.verify_status = Some(VerifyStatus::Fail);
            state.verify_issues = vec!["no draft text to verify".to_string()];
            return (state, StageOutcome::degraded("verify ran without a draft"));
        };

        let spec = Self::prompt(&state, &draft);

        match self.generator.generate(spec).await {
            Ok(response) => match Self::parse_verdict(&response) {
                Some(verdict) => {
                    let passed = verdict.status == "pass";

                    // A correction only replaces the draft when it is
                    // actually usable; content is never dropped.
                    let verified = verdict
                        .corrected_text
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| draft.clone());

                    info!(
                        passed,
                        issue_count = verdict.issues.len(),
                        "verify verdict parsed"
                    );

                    state.verify_status = Some(if passed {
                        VerifyStatus::Pass
                    } else {
                        VerifyStatus::Fail
                    });
                    state.verify_issues = verdict.issues;
                    state.verified_text = Some(verified);

                    (state, StageOutcome::Ok)
                }
                None => {
                    warn!("verify response was not a parseable verdict");
                    state.verify_status = Some(VerifyStatus::Fail);
                    state.verify_issues = vec!["fact-check output was unusable".to_string()];
                    state.verified_text = Some(draft);
                    (state, StageOutcome::degraded("unparseable fact-check verdict"))
                }
            },
            Err(e) => {
                warn!(error = %e, "verify generation failed");
                state.verify_status = Some(VerifyStatus::Fail);
                state.verify_issues = vec![format!("fact-check unavailable: {}", e)];
                state.verified_text = Some(draft);
                (
                    state,
                    StageOutcome::degraded(format!("fact-check unavailable: {}", e)),
                )
            }
        }
    }
}
