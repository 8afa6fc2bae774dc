//! Pipeline Flow Integration Tests
//!
//! Drives the orchestrator end to end with scripted collaborators:
//! termination, retry bounds, degradation, and abort behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use draftmill::stages::fallback_skeleton;
use draftmill::{
    cancel_pair, JobRequest, JobState, JobStatus, Orchestrator, RETRY_BOUND,
};
use uuid::Uuid;

use common::{
    finding, verdict, FailingGenerator, FailingSearch, FailingSink, FailingStore,
    HangingGenerator, MemorySink, MemoryStore, RoutedGenerator, ScriptedGenerator, StaticSearch,
};

fn orchestrator(
    search: impl draftmill::ResearchLookup + 'static,
    generator: impl draftmill::TextGenerator + 'static,
    sink: Arc<MemorySink>,
) -> Orchestrator {
    Orchestrator::new(Arc::new(search), Arc::new(generator), sink)
}

#[tokio::test]
async fn test_happy_path_single_pass() {
    let sink = Arc::new(MemorySink::new());
    let store = Arc::new(MemoryStore::new());

    let orch = orchestrator(
        StaticSearch::with_findings(vec![finding("census", "population was 8M in 2020")]),
        RoutedGenerator::passing(),
        sink.clone(),
    )
    .with_store(store.clone());

    let report = orch.run(JobRequest::new("city growth")).await;

    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.iteration_count, 0);
    assert_eq!(
        report.final_text.as_deref(),
        Some("A polished article with several claims.")
    );
    assert_eq!(report.metadata.get("verify_passed"), Some(&true.into()));
    assert_eq!(report.metadata.get("degraded"), Some(&false.into()));

    // One record per stage, in pipeline order
    assert_eq!(sink.stage_names(), ["research", "draft", "verify", "refine"]);

    // Created and finalized exactly once
    assert_eq!(store.created_ids(), vec![report.job_id]);
    assert_eq!(store.finalized_reports().len(), 1);
}

#[tokio::test]
async fn test_zero_findings_still_completes() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(StaticSearch::empty(), RoutedGenerator::passing(), sink);

    let report = orch
        .run(JobRequest::new("X").with_target_length(500))
        .await;

    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.iteration_count, 0);
    assert!(!report.final_text.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_failure_is_not_fatal() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(FailingSearch, RoutedGenerator::passing(), sink);

    let report = orch.run(JobRequest::new("resilience")).await;

    assert_eq!(report.status, JobStatus::Success);
}

#[tokio::test]
async fn test_verify_always_failing_hits_retry_bound() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(
        StaticSearch::with_findings(vec![finding("a", "b")]),
        RoutedGenerator::always_rejecting(),
        sink.clone(),
    );

    let report = orch.run(JobRequest::new("contested topic")).await;

    assert_eq!(report.status, JobStatus::SuccessDegraded);
    assert_eq!(report.iteration_count, RETRY_BOUND);
    assert!(!report.final_text.unwrap().is_empty());
    assert_eq!(report.metadata.get("verify_passed"), Some(&false.into()));
    assert_eq!(report.metadata.get("degraded"), Some(&true.into()));

    // Initial cycle plus RETRY_BOUND retries, then one forced refine
    let stages = sink.stage_names();
    let drafts = stages.iter().filter(|s| *s == "draft").count();
    let verifies = stages.iter().filter(|s| *s == "verify").count();
    assert_eq!(drafts, (RETRY_BOUND + 1) as usize);
    assert_eq!(verifies, (RETRY_BOUND + 1) as usize);
    assert_eq!(stages.iter().filter(|s| *s == "research").count(), 1);
    assert_eq!(stages.last().map(String::as_str), Some("refine"));
}

#[tokio::test]
async fn test_single_retry_then_pass() {
    let sink = Arc::new(MemorySink::new());

    let generator = ScriptedGenerator::new(vec![
        Ok("First draft with a wrong year.".to_string()),
        Ok(verdict(false, &["the year is wrong"], "")),
        Ok("Second draft with the right year.".to_string()),
        Ok(verdict(true, &[], "")),
        Ok("Polished final.".to_string()),
    ]);

    let orch = orchestrator(StaticSearch::empty(), generator, sink);

    let report = orch.run(JobRequest::new("history")).await;

    // One FAIL verdict, then a pass: clean success with one iteration
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.iteration_count, 1);
    assert_eq!(report.final_text.as_deref(), Some("Polished final."));
}

#[tokio::test]
async fn test_generator_always_erroring_yields_skeleton() {
    let sink = Arc::new(MemorySink::new());

    let request = JobRequest::new("offline topic").with_requirements("keep it short");
    let expected = fallback_skeleton(&JobState::new(Uuid::new_v4(), request.clone()));

    let orch = orchestrator(StaticSearch::empty(), FailingGenerator, sink);

    let report = orch.run(request).await;

    // Deterministic fallback text, job still completes
    assert_eq!(report.status, JobStatus::SuccessDegraded);
    assert_eq!(report.final_text.as_deref(), Some(expected.as_str()));
    assert_eq!(report.metadata.get("degraded"), Some(&true.into()));
    assert_eq!(report.iteration_count, RETRY_BOUND);
}

#[tokio::test]
async fn test_empty_topic_aborts() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(StaticSearch::empty(), RoutedGenerator::passing(), sink);

    let report = orch.run(JobRequest::new("")).await;

    match report.status {
        JobStatus::Aborted { ref reason } => assert!(reason.contains("topic")),
        ref other => panic!("expected aborted, got {:?}", other),
    }
    assert!(report.final_text.is_none());
}

#[tokio::test]
async fn test_zero_target_length_aborts() {
    let sink = Arc::new(MemorySink::new());
    let store = Arc::new(MemoryStore::new());

    let orch = orchestrator(StaticSearch::empty(), RoutedGenerator::passing(), sink)
        .with_store(store.clone());

    let report = orch
        .run(JobRequest::new("valid topic").with_target_length(0))
        .await;

    assert!(report.status.is_aborted());
    // Rejected before any stage ran, but the terminal report is persisted
    assert!(store.created_ids().is_empty());
    assert_eq!(store.finalized_reports().len(), 1);
}

#[tokio::test]
async fn test_cancellation_aborts_and_discards() {
    let sink = Arc::new(MemorySink::new());
    let store = Arc::new(MemoryStore::new());

    let orch = orchestrator(StaticSearch::empty(), HangingGenerator, sink)
        .with_store(store.clone());

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let report = orch
        .run_cancellable(JobRequest::new("slow topic"), token)
        .await;

    match report.status {
        JobStatus::Aborted { ref reason } => assert!(reason.contains("cancelled")),
        ref other => panic!("expected aborted, got {:?}", other),
    }

    // Partial results are not persisted as final
    assert_eq!(store.created_ids().len(), 1);
    assert!(store.finalized_reports().is_empty());
}

#[tokio::test]
async fn test_deadline_aborts() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(StaticSearch::empty(), HangingGenerator, sink)
        .with_timeout(Duration::from_millis(50));

    let report = orch.run(JobRequest::new("slow topic")).await;

    match report.status {
        JobStatus::Aborted { ref reason } => assert!(reason.contains("deadline")),
        ref other => panic!("expected aborted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sink_failure_never_fails_the_job() {
    let orch = Orchestrator::new(
        Arc::new(StaticSearch::empty()),
        Arc::new(RoutedGenerator::passing()),
        Arc::new(FailingSink),
    );

    let report = orch.run(JobRequest::new("quiet topic")).await;

    assert_eq!(report.status, JobStatus::Success);
}

#[tokio::test]
async fn test_store_failure_never_fails_the_job() {
    let sink = Arc::new(MemorySink::new());

    let orch = orchestrator(StaticSearch::empty(), RoutedGenerator::passing(), sink)
        .with_store(Arc::new(FailingStore));

    let report = orch.run(JobRequest::new("unsaved topic")).await;

    assert_eq!(report.status, JobStatus::Success);
    assert!(!report.final_text.unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_correction_is_carried_forward() {
    let sink = Arc::new(MemorySink::new());

    let generator = ScriptedGenerator::new(vec![
        Ok("Draft claiming the wrong year.".to_string()),
        Ok(verdict(true, &["fixed the year"], "Draft with the corrected year.")),
        // Refine errors: the corrected text must survive as the final text
        Err(draftmill::GeneratorError::Transport("down".to_string())),
    ]);

    let orch = orchestrator(StaticSearch::empty(), generator, sink);

    let report = orch.run(JobRequest::new("corrections")).await;

    assert_eq!(
        report.final_text.as_deref(),
        Some("Draft with the corrected year.")
    );
    // Refine degraded, so the overall status reflects it
    assert_eq!(report.status, JobStatus::SuccessDegraded);
}
