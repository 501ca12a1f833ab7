use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub company_name: String,
    pub current_price: Money,
    pub last_updated: DateTime<Utc>,
}

/// Price snapshot handed to display code. `last_updated` is `None` for the
/// defaulted quote of an unknown symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub company_name: String,
    pub price: Money,
    pub change: Money,
    pub change_percent: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
}
