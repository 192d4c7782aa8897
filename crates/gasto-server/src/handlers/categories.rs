//! Category registry and single-transaction classification handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{AppError, AppState};
use gasto_core::models::{Category, Classification};

/// GET /api/categories - List all categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.list_categories()?))
}

/// Request body for classifying a transaction
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub description: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// POST /api/classify - Classify one transaction without storing it
///
/// Results still go through (and populate) the classification cache.
pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClassifyRequest>,
) -> Json<Classification> {
    Json(
        state
            .classifier
            .classify_detailed(&req.description, req.amount)
            .await,
    )
}
