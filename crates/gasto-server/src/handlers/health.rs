//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// An LLM backend is configured (not necessarily reachable)
    pub llm: bool,
    /// Bank sync is configured
    pub pluggy: bool,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        llm: state.classifier.has_llm(),
        pluggy: state.bank.is_some(),
    })
}
