//! Read-only portfolio queries: per-position summaries valued at live quotes,
//! portfolio totals, holdings lookups and trade history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::positions::unrealized_gain;
use crate::quotes::{display_quote, QuoteSource};
use crate::store::{PositionStore, TransactionLog};
use crate::types::money::{percent_of, Money, Qty};
use crate::types::position::Position;
use crate::types::trade::{normalize_symbol, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub company_name: String,
    pub quantity: Qty,
    pub average_cost: Money,
    pub current_price: Money,
    pub total_invested: Money,
    pub current_value: Money,
    pub gain_loss: Money,
    pub gain_loss_percent: Decimal,
}

impl PositionSummary {
    pub fn from_position(position: &Position, company_name: String, current_price: Money) -> Self {
        let current_value = current_price * Decimal::from(position.quantity);
        let gain_loss = unrealized_gain(position, current_price);
        Self {
            symbol: position.symbol.clone(),
            company_name,
            quantity: position.quantity,
            average_cost: position.average_cost,
            current_price,
            total_invested: position.total_invested,
            current_value,
            gain_loss,
            gain_loss_percent: percent_of(gain_loss, position.total_invested),
        }
    }
}

#[derive(Clone)]
pub struct Portfolio {
    positions: Arc<dyn PositionStore>,
    log: Arc<dyn TransactionLog>,
    quotes: Arc<dyn QuoteSource>,
}

impl Portfolio {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        log: Arc<dyn TransactionLog>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        Self {
            positions,
            log,
            quotes,
        }
    }

    /// One summary per open position, valued at a fresh display quote.
    pub async fn summaries(&self, user_id: Uuid) -> Result<Vec<PositionSummary>, LedgerError> {
        let positions = self.positions.list_positions(user_id, None).await?;
        let mut summaries = Vec::with_capacity(positions.len());
        for position in positions.iter().filter(|p| p.quantity > 0) {
            let quote = display_quote(self.quotes.as_ref(), &position.symbol).await;
            summaries.push(PositionSummary::from_position(
                position,
                quote.company_name,
                quote.price,
            ));
        }
        Ok(summaries)
    }

    pub async fn total_value(&self, user_id: Uuid) -> Result<Money, LedgerError> {
        let summaries = self.summaries(user_id).await?;
        Ok(summaries.iter().map(|s| s.current_value).sum())
    }

    pub async fn total_gain_loss(&self, user_id: Uuid) -> Result<Money, LedgerError> {
        let summaries = self.summaries(user_id).await?;
        Ok(summaries.iter().map(|s| s.gain_loss).sum())
    }

    pub async fn total_invested(&self, user_id: Uuid) -> Result<Money, LedgerError> {
        let positions = self.positions.list_positions(user_id, None).await?;
        Ok(positions.iter().map(|p| p.total_invested).sum())
    }

    /// Zero when nothing is invested.
    pub async fn total_gain_loss_percent(&self, user_id: Uuid) -> Result<Decimal, LedgerError> {
        let summaries = self.summaries(user_id).await?;
        let invested: Money = summaries.iter().map(|s| s.total_invested).sum();
        let gain_loss: Money = summaries.iter().map(|s| s.gain_loss).sum();
        Ok(percent_of(gain_loss, invested))
    }

    pub async fn position(&self, user_id: Uuid, symbol: &str) -> Result<Option<Position>, LedgerError> {
        self.positions
            .get_position(user_id, &normalize_symbol(symbol))
            .await
    }

    pub async fn has_position(&self, user_id: Uuid, symbol: &str) -> Result<bool, LedgerError> {
        Ok(self.available_shares(user_id, symbol).await? > 0)
    }

    pub async fn available_shares(&self, user_id: Uuid, symbol: &str) -> Result<Qty, LedgerError> {
        Ok(self.position(user_id, symbol).await?.map_or(0, |p| p.quantity))
    }

    /// Most recent first, optionally for one symbol.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        symbol: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let symbol = symbol.map(normalize_symbol);
        self.log.list_transactions(user_id, symbol.as_deref()).await
    }
}
