//! Batch job orchestration
//!
//! `create` stores a pending job and returns at once; the job runs on its own
//! tokio task. Items within a job are synthesized strictly in order and each
//! item's failure is recorded in its result, never propagated to the job.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use voxmill_common::events::{EventBus, ItemOutcome, VoxEvent};
use voxmill_common::time::now;

use super::job::{item_file_name, preview_text, BatchItem, BatchItemResult, BatchJob, BatchRequest};
use super::store::{JobCell, JobStore};
use crate::error::{Result, SynthError};
use crate::services::{output_url, panic_message, TtsService};

/// Only WAV output is produced
pub const SUPPORTED_OUTPUT_FORMAT: &str = "wav";

#[derive(Clone)]
pub struct BatchOrchestrator {
    tts: TtsService,
    store: JobStore,
    events: EventBus,
    max_items: usize,
}

impl BatchOrchestrator {
    pub fn new(tts: TtsService, store: JobStore, events: EventBus, max_items: usize) -> Self {
        Self {
            tts,
            store,
            events,
            max_items,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Reject a submission before any job is created
    pub fn validate(&self, request: &BatchRequest) -> Result<()> {
        if request.items.is_empty() {
            return Err(SynthError::Validation("batch must contain at least one item".into()));
        }
        if request.items.len() > self.max_items {
            return Err(SynthError::Validation(format!(
                "batch has {} items, limit is {}",
                request.items.len(),
                self.max_items
            )));
        }
        if !request.output_format.eq_ignore_ascii_case(SUPPORTED_OUTPUT_FORMAT) {
            return Err(SynthError::Validation(format!(
                "unsupported output format '{}'",
                request.output_format
            )));
        }
        for (index, item) in request.items.iter().enumerate() {
            self.tts.validate(&item.to_request()).map_err(|e| match e {
                SynthError::Validation(msg) => SynthError::Validation(format!("items[{}]: {}", index, msg)),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Validate, store a pending job and dispatch it
    ///
    /// Returns the pending snapshot and the run task's handle; dropping the
    /// handle leaves the job running.
    pub async fn create(&self, request: BatchRequest) -> Result<(BatchJob, JoinHandle<()>)> {
        self.validate(&request)?;

        let job = BatchJob::new(request.items.len());
        let job_id = job.job_id;
        let snapshot = job.clone();
        let cell = self.store.insert(job).await;

        self.events.emit_lossy(VoxEvent::BatchJobCreated {
            job_id,
            total_items: snapshot.total_items,
            timestamp: now(),
        });
        info!(job_id = %job_id, total_items = snapshot.total_items, "Batch job created");

        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run(job_id, cell, request.items).await;
        });
        Ok((snapshot, handle))
    }

    pub async fn get(&self, job_id: &Uuid) -> Option<BatchJob> {
        self.store.get(job_id).await
    }

    pub async fn list(&self) -> Vec<BatchJob> {
        self.store.list().await
    }

    async fn run(&self, job_id: Uuid, cell: JobCell, items: Vec<BatchItem>) {
        let total_items = items.len();

        if let Err(e) = cell.write().await.start() {
            warn!(job_id = %job_id, error = %e, "Batch job not started");
            return;
        }
        self.events.emit_lossy(VoxEvent::BatchJobStarted {
            job_id,
            total_items,
            timestamp: now(),
        });
        info!(job_id = %job_id, total_items, "Batch job processing");

        if let Err(e) = self.tts.acquire_engine().await {
            let message = e.to_string();
            error!(job_id = %job_id, error = %message, "Batch job failed before dispatch");
            if let Err(state) = cell.write().await.fail(message.clone()) {
                warn!(job_id = %job_id, error = %state, "Could not mark job failed");
            }
            self.events.emit_lossy(VoxEvent::BatchJobFailed {
                job_id,
                error: message,
                timestamp: now(),
            });
            return;
        }

        for (index, item) in items.iter().enumerate() {
            let result = self.guarded_item(job_id, index, item).await;
            let outcome = if result.is_failed() {
                ItemOutcome::Failed
            } else {
                ItemOutcome::Completed
            };

            let completed_items = {
                let mut job = cell.write().await;
                if let Err(e) = job.record(result) {
                    error!(job_id = %job_id, index, error = %e, "Could not record batch item");
                    return;
                }
                job.completed_items
            };

            self.events.emit_lossy(VoxEvent::BatchItemFinished {
                job_id,
                index,
                outcome,
                completed_items,
                total_items,
                timestamp: now(),
            });
        }

        let failed_items = {
            let mut job = cell.write().await;
            if let Err(e) = job.complete() {
                error!(job_id = %job_id, error = %e, "Could not complete batch job");
                return;
            }
            job.failed_items()
        };

        if failed_items > 0 {
            let partial = SynthError::PartialBatchFailure {
                failed: failed_items,
                total: total_items,
            };
            warn!(job_id = %job_id, "Batch job completed: {}", partial);
        } else {
            info!(job_id = %job_id, total_items, "Batch job completed");
        }
        self.events.emit_lossy(VoxEvent::BatchJobCompleted {
            job_id,
            total_items,
            failed_items,
            timestamp: now(),
        });
    }

    /// A panic while processing an item fails that item only
    async fn guarded_item(&self, job_id: Uuid, index: usize, item: &BatchItem) -> BatchItemResult {
        match AssertUnwindSafe(self.process_item(job_id, index, item))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                let error = SynthError::ProcessingFailure(format!(
                    "item processing panicked: {}",
                    panic_message(payload.as_ref())
                ));
                error!(job_id = %job_id, index, error = %error, "Batch item panicked");
                BatchItemResult::Failed {
                    index,
                    text: preview_text(&item.text),
                    error: error.to_string(),
                }
            }
        }
    }

    async fn process_item(&self, job_id: Uuid, index: usize, item: &BatchItem) -> BatchItemResult {
        let file_name = item_file_name(job_id, index);
        let text = preview_text(&item.text);

        match self.tts.synthesize_to_file(&item.to_request(), &file_name).await {
            Ok(output) => BatchItemResult::Completed {
                index,
                text,
                audio_url: output_url(&output.file_name),
                duration: output.duration,
            },
            Err(e) => {
                warn!(job_id = %job_id, index, error = %e, "Batch item failed");
                BatchItemResult::Failed {
                    index,
                    text,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::JobStatus;
    use crate::engine::{EngineRegistry, TtsEngineKind};
    use crate::pipeline::PostProcessingPipeline;
    use std::sync::Arc;

    fn orchestrator(dir: &std::path::Path, max_items: usize) -> BatchOrchestrator {
        let tts = TtsService::new(
            Arc::new(EngineRegistry::new(dir.join("models"), false, 16000)),
            TtsEngineKind::Xtts,
            PostProcessingPipeline::default(),
            dir.join("outputs"),
        );
        BatchOrchestrator::new(tts, JobStore::new(), EventBus::new(64), max_items)
    }

    fn request(texts: &[&str]) -> BatchRequest {
        BatchRequest {
            items: texts.iter().map(|t| BatchItem::new(*t)).collect(),
            output_format: "wav".to_string(),
        }
    }

    #[test]
    fn test_validation() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), 2);

        assert!(orchestrator.validate(&request(&["a", "b"])).is_ok());
        assert!(orchestrator.validate(&request(&[])).is_err());
        assert!(orchestrator.validate(&request(&["a", "b", "c"])).is_err());

        let mut mp3 = request(&["a"]);
        mp3.output_format = "mp3".to_string();
        assert!(orchestrator.validate(&mp3).is_err());

        let err = orchestrator.validate(&request(&["a", " "])).unwrap_err();
        assert!(err.to_string().contains("items[1]"));
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), 50);

        let (pending, handle) = orchestrator.create(request(&["one", "two"])).await.unwrap();
        assert_eq!(pending.completed_items, 0);
        handle.await.unwrap();

        let job = orchestrator.get(&pending.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_items, 2);
        assert_eq!(job.failed_items(), 0);
        assert!(dir
            .path()
            .join("outputs")
            .join(item_file_name(job.job_id, 1))
            .exists());
    }
}
