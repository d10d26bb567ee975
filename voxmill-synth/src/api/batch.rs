//! Batch job endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::json_body;
use crate::batch::{BatchJob, BatchRequest};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BatchCreatedResponse {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<BatchJob>,
}

/// POST /api/v1/batch/tts
///
/// Responds 202 as soon as the job is stored; progress is polled through
/// `GET /batch/jobs/:job_id` or streamed from `/batch/events`.
pub async fn create_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BatchCreatedResponse>)> {
    let request = json_body(payload)?;
    let (job, _) = state.batch.create(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchCreatedResponse {
            job_id: job.job_id,
            status: "created".to_string(),
            message: format!("Batch job created with {} items", job.total_items),
        }),
    ))
}

/// GET /api/v1/batch/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<BatchJob>> {
    let not_found = || ApiError::NotFound(format!("batch job '{}' not found", job_id));
    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;
    state.batch.get(&id).await.map(Json).ok_or_else(not_found)
}

/// GET /api/v1/batch/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.batch.list().await,
    })
}

pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batch/tts", post(create_batch))
        .route("/batch/jobs", get(list_jobs))
        .route("/batch/jobs/:job_id", get(get_job))
}
