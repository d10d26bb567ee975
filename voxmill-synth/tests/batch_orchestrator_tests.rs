//! Batch orchestrator integration tests
//!
//! Jobs run against the placeholder engine wrapped in [`helpers::FailingEngine`],
//! which fails any item whose text carries the failure marker.

mod helpers;

use std::sync::Arc;

use helpers::{
    failing_registry, orchestrator, wait_for_terminal, FAIL_MARKER, PANIC_MARKER, TEST_SAMPLE_RATE,
};
use voxmill_common::events::{EventBus, ItemOutcome, VoxEvent};
use voxmill_synth::batch::{BatchItem, BatchItemResult, BatchRequest, JobEntry, JobStatus};
use voxmill_synth::engine::EngineRegistry;

fn request(texts: &[String]) -> BatchRequest {
    BatchRequest {
        items: texts.iter().map(|t| BatchItem::new(t.clone())).collect(),
        output_format: "wav".to_string(),
    }
}

fn texts(n: usize, failing: &[usize]) -> Vec<String> {
    (0..n)
        .map(|i| {
            if failing.contains(&i) {
                format!("item {} {}", i, FAIL_MARKER)
            } else {
                format!("item {}", i)
            }
        })
        .collect()
}

fn item_results(entries: &[JobEntry]) -> Vec<&BatchItemResult> {
    entries
        .iter()
        .map(|entry| match entry {
            JobEntry::Item(result) => result,
            JobEntry::Diagnostic { error } => panic!("unexpected diagnostic: {}", error),
        })
        .collect()
}

#[tokio::test]
async fn failing_middle_item_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));

    let (pending, _) = orchestrator.create(request(&texts(3, &[1]))).await.unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert_eq!(pending.total_items, 3);

    let job = wait_for_terminal(&orchestrator, pending.job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_items, 3);

    let results = item_results(&job.results);
    let statuses: Vec<bool> = results.iter().map(|r| r.is_failed()).collect();
    assert_eq!(statuses, vec![false, true, false]);

    match results[1] {
        BatchItemResult::Failed { index, error, .. } => {
            assert_eq!(*index, 1);
            assert!(error.contains("synthetic failure"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    match results[2] {
        BatchItemResult::Completed { audio_url, duration, .. } => {
            assert_eq!(
                audio_url,
                &format!("/outputs/batch_{}_002.wav", job.job_id)
            );
            assert!(*duration > 0.0);
        }
        other => panic!("expected success, got {:?}", other),
    }

    let outputs = dir.path().join("outputs");
    assert!(outputs.join(format!("batch_{}_000.wav", job.job_id)).exists());
    assert!(!outputs.join(format!("batch_{}_001.wav", job.job_id)).exists());
}

#[tokio::test]
async fn only_the_failing_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));
    let n = 4;

    for k in 0..n {
        let (pending, handle) = orchestrator.create(request(&texts(n, &[k]))).await.unwrap();
        handle.await.unwrap();

        let job = orchestrator.get(&pending.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_items, n);
        for (i, result) in item_results(&job.results).iter().enumerate() {
            assert_eq!(result.index(), i);
            assert_eq!(result.is_failed(), i == k, "k = {}, i = {}", k, i);
        }
    }
    assert_eq!(orchestrator.list().await.len(), n);
}

#[tokio::test]
async fn engine_acquisition_failure_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    // Assets required but the models directory is empty
    let registry = Arc::new(EngineRegistry::new(dir.path().join("models"), true, TEST_SAMPLE_RATE));
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let orchestrator = orchestrator(dir.path(), registry, events);

    let (pending, handle) = orchestrator.create(request(&texts(2, &[]))).await.unwrap();
    handle.await.unwrap();

    let job = orchestrator.get(&pending.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.completed_items, 0);
    assert_eq!(job.results.len(), 1);
    assert!(matches!(&job.results[0], JobEntry::Diagnostic { error } if error.contains("not found")));

    // The job passes through processing before it fails
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.job_id(), pending.job_id);
        kinds.push(event.event_type().to_string());
    }
    assert_eq!(kinds, vec!["BatchJobCreated", "BatchJobStarted", "BatchJobFailed"]);
}

#[tokio::test]
async fn panicking_item_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));

    let items = vec![
        "ok one".to_string(),
        format!("{} here", PANIC_MARKER),
        "ok two".to_string(),
    ];
    let (pending, handle) = orchestrator.create(request(&items)).await.unwrap();
    handle.await.expect("run task survives an engine panic");

    let job = orchestrator.get(&pending.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_items, 3);
    assert_eq!(job.failed_items(), 1);

    let results = item_results(&job.results);
    match results[1] {
        BatchItemResult::Failed { index, error, .. } => {
            assert_eq!(*index, 1);
            assert!(error.contains("panicked"), "error was {}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!results[2].is_failed());

    // The engine mutex is released by the unwind and stays usable
    let (next, handle) = orchestrator.create(request(&texts(1, &[]))).await.unwrap();
    handle.await.unwrap();
    let next = orchestrator.get(&next.job_id).await.unwrap();
    assert_eq!(next.failed_items(), 0);
}

#[tokio::test]
async fn progress_events_are_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, events);

    let (pending, handle) = orchestrator.create(request(&texts(5, &[3]))).await.unwrap();
    handle.await.unwrap();

    let mut progress = Vec::new();
    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.job_id(), pending.job_id);
        match event {
            VoxEvent::BatchItemFinished {
                index,
                outcome,
                completed_items,
                total_items,
                ..
            } => {
                assert_eq!(total_items, 5);
                assert_eq!(completed_items, index + 1);
                assert_eq!(outcome == ItemOutcome::Failed, index == 3);
                progress.push(completed_items);
            }
            VoxEvent::BatchJobCompleted { failed_items, .. } => completed = Some(failed_items),
            _ => {}
        }
    }
    assert_eq!(progress, vec![1, 2, 3, 4, 5]);
    assert_eq!(completed, Some(1));
}

#[tokio::test]
async fn jobs_run_concurrently_and_independently() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));

    let (first, _) = orchestrator.create(request(&texts(3, &[0]))).await.unwrap();
    let (second, _) = orchestrator.create(request(&texts(2, &[]))).await.unwrap();

    let first = wait_for_terminal(&orchestrator, first.job_id).await;
    let second = wait_for_terminal(&orchestrator, second.job_id).await;

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.failed_items(), 1);
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.failed_items(), 0);
}

#[tokio::test]
async fn long_text_is_truncated_in_results() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));

    let long = "声".repeat(80);
    let (pending, handle) = orchestrator.create(request(&[long])).await.unwrap();
    handle.await.unwrap();

    let job = orchestrator.get(&pending.job_id).await.unwrap();
    match item_results(&job.results)[0] {
        BatchItemResult::Completed { text, .. } => {
            assert_eq!(text.chars().count(), 53);
            assert!(text.ends_with("..."));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_batches_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(dir.path(), failing_registry(dir.path()).await, EventBus::new(64));

    assert!(orchestrator.create(request(&[])).await.is_err());
    assert!(orchestrator.create(request(&texts(51, &[]))).await.is_err());
    assert!(orchestrator.list().await.is_empty());
}
