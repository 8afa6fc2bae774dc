//! JSONL stage-record sink.
//!
//! Records are appended as newline-delimited JSON under
//! `<base>/<job_id>/stages.jsonl`, one file per job. Appends take an
//! exclusive file lock so concurrent jobs sharing a sink (or a future
//! second process) cannot interleave partial lines; within one job the
//! pipeline is sequential, so its stream is strictly ordered.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fs2::FileExt;
use uuid::Uuid;

use crate::domain::StageRecord;

use super::ObservabilitySink;

/// File-based sink writing one JSONL stream per job.
pub struct JsonlSink {
    base_dir: PathBuf,
}

impl JsonlSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path of a job's record stream.
    pub fn stream_path(&self, job_id: Uuid) -> PathBuf {
        self.base_dir.join(job_id.to_string()).join("stages.jsonl")
    }

    fn append_line(path: &Path, line: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create sink directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open record stream: {}", path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on stages.jsonl")?;

        let result = writeln!(file, "{}", line).context("Failed to write stage record");

        let _ = file.unlock();
        result
    }

    /// Read back a job's records in append order.
    pub fn replay(&self, job_id: Uuid) -> Result<Vec<StageRecord>> {
        let path = self.stream_path(job_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read record stream: {}", path.display()))?;

        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: StageRecord = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse stage record: {}", line))?;
            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl ObservabilitySink for JsonlSink {
    async fn record(&self, record: StageRecord) -> Result<()> {
        let path = self.stream_path(record.job_id);
        let line = serde_json::to_string(&record).context("Failed to serialize stage record")?;

        tokio::task::spawn_blocking(move || Self::append_line(&path, &line))
            .await
            .context("Sink writer task panicked")?
    }
}
