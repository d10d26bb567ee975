//! Test Helper Utilities
//!
//! Shared utilities for testing voxmill-synth

#![allow(dead_code)]

pub mod signals;

pub use signals::{concat, silence, sine};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;
use voxmill_common::events::EventBus;
use voxmill_synth::audio::AudioBuffer;
use voxmill_synth::batch::{BatchJob, BatchOrchestrator, JobStore};
use voxmill_synth::config::Settings;
use voxmill_synth::engine::{
    EngineError, EngineRegistry, PlaceholderTtsEngine, TtsEngine, TtsEngineKind, TtsRequest,
};
use voxmill_synth::pipeline::PostProcessingPipeline;
use voxmill_synth::services::TtsService;

/// Sample rate used by test services (lower than production to keep tests fast)
pub const TEST_SAMPLE_RATE: u32 = 16000;

/// Texts containing this marker make [`FailingEngine`] fail
pub const FAIL_MARKER: &str = "FAIL";

/// Texts containing this marker make [`FailingEngine`] panic
pub const PANIC_MARKER: &str = "PANIC";

/// Placeholder engine that fails or panics on marked texts
pub struct FailingEngine {
    inner: PlaceholderTtsEngine,
}

impl FailingEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: PlaceholderTtsEngine::new(TtsEngineKind::Xtts, sample_rate),
        }
    }
}

#[async_trait]
impl TtsEngine for FailingEngine {
    fn kind(&self) -> TtsEngineKind {
        TtsEngineKind::Xtts
    }

    async fn synthesize(&self, request: &TtsRequest) -> Result<AudioBuffer, EngineError> {
        if request.text.contains(PANIC_MARKER) {
            panic!("engine crashed on '{}'", request.text);
        }
        if request.text.contains(FAIL_MARKER) {
            return Err(EngineError::ProcessingFailure(format!(
                "synthetic failure for '{}'",
                request.text
            )));
        }
        self.inner.synthesize(request).await
    }
}

/// Settings rooted in a temporary directory
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::defaults(root);
    settings.sample_rate = TEST_SAMPLE_RATE;
    settings
}

/// Engine registry with [`FailingEngine`] installed as the xtts engine
pub async fn failing_registry(root: &Path) -> Arc<EngineRegistry> {
    let registry = Arc::new(EngineRegistry::new(root.join("models"), false, TEST_SAMPLE_RATE));
    registry
        .install_tts_engine(Box::new(FailingEngine::new(TEST_SAMPLE_RATE)))
        .await;
    registry
}

/// Orchestrator over `registry`, writing into `<root>/outputs`
pub fn orchestrator(root: &Path, registry: Arc<EngineRegistry>, events: EventBus) -> BatchOrchestrator {
    let tts = TtsService::new(
        registry,
        TtsEngineKind::Xtts,
        PostProcessingPipeline::default(),
        root.join("outputs"),
    );
    BatchOrchestrator::new(tts, JobStore::new(), events, 50)
}

/// Poll until the job reaches a terminal state, checking progress invariants on every snapshot
pub async fn wait_for_terminal(orchestrator: &BatchOrchestrator, job_id: Uuid) -> BatchJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    let mut last_progress = 0;
    loop {
        let job = orchestrator.get(&job_id).await.expect("job should exist");
        assert!(job.completed_items <= job.total_items);
        assert!(job.completed_items >= last_progress, "progress went backwards");
        last_progress = job.completed_items;
        if job.status.is_terminal() {
            return job;
        }
        assert!(tokio::time::Instant::now() < deadline, "job did not finish in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
