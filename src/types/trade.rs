use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::types::money::{Money, Qty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: "buy", "Buy" and "BUY" all parse.
impl FromStr for Side {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(LedgerError::InvalidSide(s.to_string())),
        }
    }
}

/// A request to buy or sell at market. Only constructed through [`TradeIntent::new`],
/// so the quantity is always positive and the symbol upper case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    user_id: Uuid,
    symbol: String,
    side: Side,
    quantity: Qty,
}

impl TradeIntent {
    pub fn new(user_id: Uuid, symbol: &str, side: Side, quantity: i64) -> Result<Self, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity.to_string()));
        }
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(LedgerError::UnknownSymbol(symbol));
        }
        Ok(Self {
            user_id,
            symbol,
            side,
            quantity: quantity as Qty,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn quantity(&self) -> Qty {
        self.quantity
    }
}

/// Settled trade. Written once to the transaction log, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: Qty,
    pub unit_price: Money,
    pub total_amount: Money,
    pub settled_at: DateTime<Utc>,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
