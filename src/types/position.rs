use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::money::{Money, Qty};

/// Aggregate holding per (user, symbol). A stored position always has `quantity > 0`.
///
/// `total_invested` is an exact running sum; `average_cost` is the rounded
/// display value derived from it on each buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Qty,
    pub average_cost: Money,
    pub total_invested: Money,
    pub updated_at: DateTime<Utc>,
}
