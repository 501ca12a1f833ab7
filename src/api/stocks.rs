use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::quotes::{display_quote, QuoteSource};
use crate::types::quote::{Quote, Stock};

pub async fn list_stocks(State(state): State<AppState>) -> Result<Json<Vec<Stock>>, ApiError> {
    Ok(Json(state.quotes.list_stocks().await?))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Stock>, ApiError> {
    let stock = state
        .quotes
        .stock(&symbol)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Stock '{}' not found", symbol.to_uppercase())))?;
    Ok(Json(stock))
}

/// Simulated quote; moves the stored price when jitter is enabled. Unknown
/// symbols get the default display quote.
pub async fn get_quote(State(state): State<AppState>, Path(symbol): Path<String>) -> Json<Quote> {
    Json(display_quote(state.quotes.as_ref(), &symbol).await)
}

pub async fn stock_exists(State(state): State<AppState>, Path(symbol): Path<String>) -> Json<bool> {
    Json(state.quotes.stock_exists(&symbol).await)
}
