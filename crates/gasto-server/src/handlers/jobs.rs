//! Bulk categorization handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::{AppError, AppState};
use gasto_core::models::CategorizationJob;

#[derive(Debug, Serialize)]
pub struct CategorizeResponse {
    pub message: String,
    pub task_id: i64,
}

/// POST /api/users/:user_id/transactions/categorize - Start a background job
///
/// Responds 202 as soon as the job is recorded; poll `/api/jobs/:id`.
pub async fn categorize_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<CategorizeResponse>), AppError> {
    let handle = state.queue.enqueue(user_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CategorizeResponse {
            message: "Categorization started".to_string(),
            task_id: handle.job_id,
        }),
    ))
}

/// GET /api/users/:user_id/jobs - Recent jobs of a user, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<CategorizationJob>>, AppError> {
    Ok(Json(state.queue.list_jobs(user_id)?))
}

/// GET /api/jobs/:id - Job status
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CategorizationJob>, AppError> {
    state
        .queue
        .get_job(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Job not found"))
}
