//! Batch job record and its state machine
//!
//! ```text
//! pending ──start──▶ processing ──complete──▶ completed
//!                         │
//!                         └────fail────▶ failed
//! ```
//!
//! Terminal jobs reject every mutator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::TtsRequest;

/// Item text is echoed back truncated to this many characters
pub const TEXT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one item, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItemResult {
    Completed {
        index: usize,
        text: String,
        audio_url: String,
        duration: f64,
    },
    Failed {
        index: usize,
        text: String,
        error: String,
    },
}

impl BatchItemResult {
    pub fn index(&self) -> usize {
        match self {
            BatchItemResult::Completed { index, .. } | BatchItemResult::Failed { index, .. } => *index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchItemResult::Failed { .. })
    }
}

/// One element of `results`: an item outcome, or the diagnostic of a job
/// that failed before dispatching any item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobEntry {
    Item(BatchItemResult),
    Diagnostic { error: String },
}

/// Illegal job mutation
#[derive(Debug, Error, PartialEq)]
pub enum JobStateError {
    #[error("job {job_id} is {status}, cannot {action}")]
    InvalidTransition {
        job_id: Uuid,
        status: JobStatus,
        action: &'static str,
    },

    #[error("job {job_id} expected result for item {expected}, got {got}")]
    OutOfOrder { job_id: Uuid, expected: usize, got: usize },

    #[error("job {job_id} already holds all {total} results")]
    ProgressOverflow { job_id: Uuid, total: usize },

    #[error("job {job_id} has {completed} of {total} results, cannot complete")]
    Incomplete { job_id: Uuid, completed: usize, total: usize },
}

/// Pollable batch job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_items: usize,
    pub completed_items: usize,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub created_at: String,
    pub results: Vec<JobEntry>,
}

impl BatchJob {
    pub fn new(total_items: usize) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total_items,
            completed_items: 0,
            created_at: voxmill_common::time::local_timestamp(),
            results: Vec::with_capacity(total_items),
        }
    }

    /// pending → processing
    pub fn start(&mut self) -> Result<(), JobStateError> {
        self.require(JobStatus::Pending, "start")?;
        self.status = JobStatus::Processing;
        Ok(())
    }

    /// Append the next item's result and advance progress in one step
    pub fn record(&mut self, result: BatchItemResult) -> Result<(), JobStateError> {
        self.require(JobStatus::Processing, "record a result")?;
        if self.completed_items >= self.total_items {
            return Err(JobStateError::ProgressOverflow {
                job_id: self.job_id,
                total: self.total_items,
            });
        }
        if result.index() != self.completed_items {
            return Err(JobStateError::OutOfOrder {
                job_id: self.job_id,
                expected: self.completed_items,
                got: result.index(),
            });
        }
        self.results.push(JobEntry::Item(result));
        self.completed_items += 1;
        Ok(())
    }

    /// processing → completed, once every item has a result
    pub fn complete(&mut self) -> Result<(), JobStateError> {
        self.require(JobStatus::Processing, "complete")?;
        if self.completed_items != self.total_items {
            return Err(JobStateError::Incomplete {
                job_id: self.job_id,
                completed: self.completed_items,
                total: self.total_items,
            });
        }
        self.status = JobStatus::Completed;
        Ok(())
    }

    /// processing → failed, with a diagnostic entry
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobStateError> {
        self.require(JobStatus::Processing, "fail")?;
        self.results.push(JobEntry::Diagnostic { error: error.into() });
        self.status = JobStatus::Failed;
        Ok(())
    }

    /// Items whose result is `failed`
    pub fn failed_items(&self) -> usize {
        self.item_results().filter(|r| r.is_failed()).count()
    }

    pub fn item_results(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter().filter_map(|entry| match entry {
            JobEntry::Item(result) => Some(result),
            JobEntry::Diagnostic { .. } => None,
        })
    }

    fn require(&self, expected: JobStatus, action: &'static str) -> Result<(), JobStateError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(JobStateError::InvalidTransition {
                job_id: self.job_id,
                status: self.status,
                action,
            })
        }
    }
}

/// One requested utterance
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchItem {
    pub text: String,
    #[serde(default = "default_speaker")]
    pub speaker_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl BatchItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker_id: default_speaker(),
            language: default_language(),
            speed: default_speed(),
        }
    }

    pub fn to_request(&self) -> TtsRequest {
        TtsRequest {
            text: self.text.clone(),
            speaker_id: self.speaker_id.clone(),
            language: self.language.clone(),
            speed: self.speed,
            emotion: "neutral".to_string(),
        }
    }
}

/// Batch submission body
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_speaker() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_output_format() -> String {
    "wav".to_string()
}

/// First 50 characters, with `...` appended when anything was cut
pub fn preview_text(text: &str) -> String {
    match text.char_indices().nth(TEXT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `batch_<job_id>_<index:03>.wav`
pub fn item_file_name(job_id: Uuid, index: usize) -> String {
    format!("batch_{}_{:03}.wav", job_id, index)
}
