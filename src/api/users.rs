use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::types::account::Account;
use crate::types::money::Money;

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub username: String,
    #[serde(default)]
    pub balance: Money,
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(state.accounts.list_accounts().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>, ApiError> {
    let account = state
        .accounts
        .get_account(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {id} not found")))?;
    Ok(Json(account))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Money>, ApiError> {
    let Json(account) = get_user(State(state), Path(id)).await?;
    Ok(Json(account.balance))
}

pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account = state
        .accounts
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{username}' not found")))?;
    Ok(Json(account))
}

/// Open a cash account. Username is required and case-insensitively unique.
pub async fn open_account(
    State(state): State<AppState>,
    payload: Result<Json<OpenAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let Json(req) = payload?;
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }
    if req.balance < Decimal::ZERO {
        return Err(ApiError::bad_request("Starting balance cannot be negative"));
    }

    let account = Account::open(&req.username, req.balance);
    if !state.accounts.insert_account(&account).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Username '{}' is already taken", account.username),
        ));
    }
    tracing::info!(user_id = %account.id, username = %account.username, "account opened");
    Ok((StatusCode::CREATED, Json(account)))
}
