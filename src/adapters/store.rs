//! File-backed job persistence.
//!
//! One directory per job under the jobs root: `request.json` written at
//! submission, `report.json` at completion. Plain JSON files keep the
//! store inspectable and make persistence genuinely optional; the
//! orchestrator treats every error here as a warning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::domain::{JobReport, JobRequest};

use super::JobStore;

/// JSON-file job store.
pub struct FileJobStore {
    jobs_dir: PathBuf,
}

impl FileJobStore {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.jobs_dir.join(job_id.to_string())
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create job directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(value).context("Failed to serialize job data")?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write: {}", path.display()))?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create_job(&self, job_id: Uuid, request: &JobRequest) -> Result<()> {
        let path = self.job_dir(job_id).join("request.json");
        Self::write_json(&path, request).await
    }

    async fn finalize_job(&self, report: &JobReport) -> Result<()> {
        let path = self.job_dir(report.job_id).join("report.json");
        Self::write_json(&path, report).await
    }

    async fn load_job(&self, job_id: Uuid) -> Result<Option<JobReport>> {
        let path = self.job_dir(job_id).join("report.json");
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read: {}", path.display()))?;

        let report: JobReport = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))?;

        Ok(Some(report))
    }

    async fn list_jobs(&self) -> Result<Vec<JobReport>> {
        if !self.jobs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        let mut entries = fs::read_dir(&self.jobs_dir)
            .await
            .with_context(|| format!("Failed to read jobs dir: {}", self.jobs_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let Ok(job_id) = Uuid::parse_str(&name) else {
                continue;
            };

            // Jobs that never finalized have no report; skip them.
            if let Some(report) = self.load_job(job_id).await? {
                reports.push(report);
            }
        }

        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(reports)
    }
}
