use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::portfolio::PositionSummary;
use crate::types::money::{Money, Qty};
use crate::types::position::Position;
use crate::types::trade::Transaction;

pub async fn summaries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PositionSummary>>, ApiError> {
    Ok(Json(state.portfolio.summaries(id).await?))
}

pub async fn total_value(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Money>, ApiError> {
    Ok(Json(state.portfolio.total_value(id).await?))
}

pub async fn total_gain_loss(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Money>, ApiError> {
    Ok(Json(state.portfolio.total_gain_loss(id).await?))
}

pub async fn total_gain_loss_percent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Decimal>, ApiError> {
    Ok(Json(state.portfolio.total_gain_loss_percent(id).await?))
}

pub async fn total_invested(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Money>, ApiError> {
    Ok(Json(state.portfolio.total_invested(id).await?))
}

pub async fn transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.portfolio.transactions(id, None).await?))
}

pub async fn symbol_transactions(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.portfolio.transactions(id, Some(&symbol)).await?))
}

pub async fn position(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> Result<Json<Position>, ApiError> {
    let position = state
        .portfolio
        .position(id, &symbol)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No position in {} for user {id}", symbol.to_uppercase())))?;
    Ok(Json(position))
}

pub async fn available_shares(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> Result<Json<Qty>, ApiError> {
    Ok(Json(state.portfolio.available_shares(id, &symbol).await?))
}

pub async fn has_position(
    State(state): State<AppState>,
    Path((id, symbol)): Path<(Uuid, String)>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(state.portfolio.has_position(id, &symbol).await?))
}
