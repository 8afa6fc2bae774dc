//! Stage execution records for the observability sink.
//!
//! One record is emitted per stage execution. Records from concurrent jobs
//! may interleave in a shared sink; within a single job they are strictly
//! ordered.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Telemetry for one stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Unique identifier for this record
    pub id: Uuid,

    /// The job this record belongs to
    pub job_id: Uuid,

    /// Stage name ("research", "draft", "verify", "refine")
    pub stage: String,

    /// Preview of the stage's primary input
    pub input: String,

    /// Preview of the stage's primary output
    pub output: String,

    /// How the stage ended
    pub status: StageStatus,

    /// When the stage finished (UTC)
    pub timestamp: DateTime<Utc>,

    /// Wall-clock duration of the stage
    pub duration_ms: Option<u64>,

    /// Stage-specific counters (finding count, issue count, input digest)
    pub metrics: BTreeMap<String, Value>,
}

impl StageRecord {
    /// Create a record with the current timestamp.
    pub fn new(
        job_id: Uuid,
        stage: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        status: StageStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            stage: stage.into(),
            input: input.into(),
            output: output.into(),
            status,
            timestamp: Utc::now(),
            duration_ms: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}

/// How a stage execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage did its job fully
    Ok,

    /// Stage fell back to reduced-quality output
    Degraded,

    /// Stage aborted the job
    Fatal,
}

/// Truncate text for inclusion in a record, marking the cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}…", truncated)
}

/// Short content digest (first 8 bytes of SHA-256, hex) for correlating
/// records without embedding full payloads.
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
