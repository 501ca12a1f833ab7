use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Number;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::error::LedgerError;
use crate::types::trade::{Side, TradeIntent, Transaction};

/// Body of POST /trades. `side` is "BUY" or "SELL", any case. `quantity` is
/// any JSON number so fractional values fail as an invalid quantity.
#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub user_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub quantity: Number,
}

impl TradeRequest {
    pub fn into_intent(self) -> Result<TradeIntent, LedgerError> {
        let side: Side = self.side.parse()?;
        let quantity = self
            .quantity
            .as_i64()
            .ok_or_else(|| LedgerError::InvalidQuantity(self.quantity.to_string()))?;
        TradeIntent::new(self.user_id, &self.symbol, side, quantity)
    }
}

pub async fn execute_trade(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Json<Transaction>, ApiError> {
    let Json(req) = payload?;
    let intent = req.into_intent()?;
    Ok(Json(state.engine.settle(intent).await?))
}

/// Advisory pre-check. Malformed requests answer `false` rather than an error.
pub async fn validate_trade(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Json<bool> {
    let Ok(Json(req)) = payload else {
        return Json(false);
    };
    let Ok(intent) = req.into_intent() else {
        return Json(false);
    };
    Json(state.engine.can_settle(&intent).await)
}
