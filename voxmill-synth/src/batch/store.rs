//! In-memory job table
//!
//! The outer map lock is held only to insert or look up a cell. Each cell
//! has a single writer, the job's run task; handlers read cloned snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::job::BatchJob;

/// Shared, individually locked job record
pub type JobCell = Arc<RwLock<BatchJob>>;

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobCell>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `job` and hand back its cell
    pub async fn insert(&self, job: BatchJob) -> JobCell {
        let job_id = job.job_id;
        let cell = Arc::new(RwLock::new(job));
        self.jobs.write().await.insert(job_id, Arc::clone(&cell));
        cell
    }

    pub async fn cell(&self, job_id: &Uuid) -> Option<JobCell> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Snapshot of one job
    pub async fn get(&self, job_id: &Uuid) -> Option<BatchJob> {
        let cell = self.cell(job_id).await?;
        let job = cell.read().await.clone();
        Some(job)
    }

    /// Snapshots of every job, oldest first
    pub async fn list(&self) -> Vec<BatchJob> {
        let cells: Vec<JobCell> = self.jobs.read().await.values().cloned().collect();
        let mut jobs = Vec::with_capacity(cells.len());
        for cell in cells {
            jobs.push(cell.read().await.clone());
        }
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
