//! Asynchronous multi-item TTS jobs

pub mod job;
pub mod orchestrator;
pub mod store;

pub use job::{
    BatchItem, BatchItemResult, BatchJob, BatchRequest, JobEntry, JobStateError, JobStatus,
};
pub use orchestrator::BatchOrchestrator;
pub use store::{JobCell, JobStore};
