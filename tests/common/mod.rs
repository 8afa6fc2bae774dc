//! Shared collaborator doubles for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use draftmill::{
    Finding, GeneratorError, JobReport, JobRequest, JobStore, ObservabilitySink, PromptSpec,
    ResearchLookup, SearchError, StageRecord, TextGenerator,
};

pub fn finding(title: &str, snippet: &str) -> Finding {
    Finding {
        title: title.to_string(),
        snippet: snippet.to_string(),
        source_ref: format!("https://example.com/{}", title.replace(' ', "-")),
    }
}

/// JSON verdict in the format the Verify stage requests.
pub fn verdict(pass: bool, issues: &[&str], corrected: &str) -> String {
    serde_json::json!({
        "status": if pass { "pass" } else { "fail" },
        "issues": issues,
        "corrected_text": corrected,
    })
    .to_string()
}

/// Lookup returning a fixed set of findings.
pub struct StaticSearch {
    findings: Vec<Finding>,
}

impl StaticSearch {
    pub fn with_findings(findings: Vec<Finding>) -> Self {
        Self { findings }
    }

    pub fn empty() -> Self {
        Self { findings: Vec::new() }
    }
}

#[async_trait]
impl ResearchLookup for StaticSearch {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<Finding>, SearchError> {
        Ok(self.findings.iter().take(limit).cloned().collect())
    }
}

/// Lookup that always errors.
pub struct FailingSearch;

#[async_trait]
impl ResearchLookup for FailingSearch {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Finding>, SearchError> {
        Err(SearchError::Transport("search unreachable".to_string()))
    }
}

/// Generator that pops scripted responses in order and captures every
/// prompt it was given. Exhausting the script is an error response.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GeneratorError>>>,
    pub prompts: Mutex<Vec<PromptSpec>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GeneratorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn captured_prompts(&self) -> Vec<PromptSpec> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, spec: PromptSpec) -> Result<String, GeneratorError> {
        self.prompts.lock().unwrap().push(spec);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GeneratorError::Transport("script exhausted".to_string())))
    }
}

/// Generator that answers by persona: drafts for the writer, a fixed
/// verdict for the fact-checker, polished text for the editor. Stands in
/// for a generator that always succeeds.
pub struct RoutedGenerator {
    pub draft: String,
    pub verdict: String,
    pub polish: String,
}

impl RoutedGenerator {
    pub fn passing() -> Self {
        Self {
            draft: "A drafted article with several claims.".to_string(),
            verdict: verdict(true, &[], ""),
            polish: "A polished article with several claims.".to_string(),
        }
    }

    pub fn always_rejecting() -> Self {
        Self {
            verdict: verdict(false, &["claim is unsupported"], ""),
            ..Self::passing()
        }
    }
}

#[async_trait]
impl TextGenerator for RoutedGenerator {
    async fn generate(&self, spec: PromptSpec) -> Result<String, GeneratorError> {
        if spec.system.contains("fact-checker") {
            Ok(self.verdict.clone())
        } else if spec.system.contains("editor") {
            Ok(self.polish.clone())
        } else {
            Ok(self.draft.clone())
        }
    }
}

/// Generator that always errors.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _spec: PromptSpec) -> Result<String, GeneratorError> {
        Err(GeneratorError::Transport("generator unreachable".to_string()))
    }
}

/// Generator that never completes; for cancellation and timeout tests.
pub struct HangingGenerator;

#[async_trait]
impl TextGenerator for HangingGenerator {
    async fn generate(&self, _spec: PromptSpec) -> Result<String, GeneratorError> {
        std::future::pending().await
    }
}

/// In-memory sink capturing records in order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<StageRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StageRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.records().iter().map(|r| r.stage.clone()).collect()
    }
}

#[async_trait]
impl ObservabilitySink for MemorySink {
    async fn record(&self, record: StageRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Sink that always errors; record failures must never fail a job.
pub struct FailingSink;

#[async_trait]
impl ObservabilitySink for FailingSink {
    async fn record(&self, _record: StageRecord) -> anyhow::Result<()> {
        anyhow::bail!("sink unavailable")
    }
}

/// In-memory job store capturing lifecycle calls.
#[derive(Default)]
pub struct MemoryStore {
    pub created: Mutex<Vec<Uuid>>,
    pub finalized: Mutex<Vec<JobReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_ids(&self) -> Vec<Uuid> {
        self.created.lock().unwrap().clone()
    }

    pub fn finalized_reports(&self) -> Vec<JobReport> {
        self.finalized.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job_id: Uuid, _request: &JobRequest) -> anyhow::Result<()> {
        self.created.lock().unwrap().push(job_id);
        Ok(())
    }

    async fn finalize_job(&self, report: &JobReport) -> anyhow::Result<()> {
        self.finalized.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn load_job(&self, job_id: Uuid) -> anyhow::Result<Option<JobReport>> {
        Ok(self
            .finalized
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.job_id == job_id)
            .cloned())
    }

    async fn list_jobs(&self) -> anyhow::Result<Vec<JobReport>> {
        Ok(self.finalized_reports())
    }
}

/// Store that always errors; persistence failures must never fail a job.
pub struct FailingStore;

#[async_trait]
impl JobStore for FailingStore {
    async fn create_job(&self, _job_id: Uuid, _request: &JobRequest) -> anyhow::Result<()> {
        anyhow::bail!("store unavailable")
    }

    async fn finalize_job(&self, _report: &JobReport) -> anyhow::Result<()> {
        anyhow::bail!("store unavailable")
    }

    async fn load_job(&self, _job_id: Uuid) -> anyhow::Result<Option<JobReport>> {
        anyhow::bail!("store unavailable")
    }

    async fn list_jobs(&self) -> anyhow::Result<Vec<JobReport>> {
        anyhow::bail!("store unavailable")
    }
}
