//! Bank account linking and transaction sync handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState};
use gasto_core::models::{BankAccount, SyncResult};
use gasto_core::BankSync;

fn bank(state: &AppState) -> Result<&BankSync, AppError> {
    state
        .bank
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Bank sync is not configured"))
}

/// GET /api/users/:user_id/accounts - List a user's accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<BankAccount>>, AppError> {
    Ok(Json(state.db.list_accounts(user_id)?))
}

/// Request body for linking a Pluggy item
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub item_id: String,
}

/// POST /api/users/:user_id/accounts/link - Link every account of a Pluggy item
pub async fn link_accounts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<Vec<BankAccount>>, AppError> {
    let item_id = req.item_id.trim();
    if item_id.is_empty() {
        return Err(AppError::bad_request("item_id is required"));
    }
    Ok(Json(bank(&state)?.link_item(user_id, item_id).await?))
}

/// DELETE /api/users/:user_id/accounts/:id - Disconnect an account
pub async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    Path((user_id, account_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    gasto_core::disconnect_account(&state.db, user_id, account_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for a sync; both dates are `YYYY-MM-DD`
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn required_date(value: Option<&str>, field: &str) -> Result<NaiveDate, AppError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(&format!("{} is required", field)))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(&format!("{} must be YYYY-MM-DD", field)))
}

/// POST /api/users/:user_id/accounts/:id/sync - Pull transactions for a date range
pub async fn sync_account(
    State(state): State<Arc<AppState>>,
    Path((user_id, account_id)): Path<(i64, i64)>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResult>, AppError> {
    let from = required_date(req.start_date.as_deref(), "start_date")?;
    let to = required_date(req.end_date.as_deref(), "end_date")?;

    let result = bank(&state)?
        .sync_account_transactions(user_id, account_id, from, to)
        .await?;
    Ok(Json(result))
}
