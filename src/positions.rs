//! Average-cost position math: apply_buy, apply_sell, unrealized_gain.
//! Pure functions, testable without any store.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::types::money::{notional, round_money, Money, Qty};
use crate::types::position::Position;

/// Result of reducing a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellOutcome {
    /// `None` when the sale closed the position.
    pub remaining: Option<Position>,
    /// Invested capital removed from the position: `average_cost × quantity`.
    pub sold_investment: Money,
    pub realized_gain: Money,
}

/// Add `quantity` bought at `unit_price` to `prior` (or open a new position).
///
/// Quantity and invested capital are exact running sums; only the stored
/// average cost is rounded.
pub fn apply_buy(
    prior: Option<&Position>,
    user_id: Uuid,
    symbol: &str,
    quantity: Qty,
    unit_price: Money,
) -> Result<Position, LedgerError> {
    let total_amount = notional(unit_price, quantity)?;

    let (new_qty, new_invested, new_avg) = match prior {
        Some(pos) => {
            let new_qty = pos
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| LedgerError::InvalidQuantity(quantity.to_string()))?;
            let new_invested = pos.total_invested + total_amount;
            let new_avg = round_money(new_invested / Decimal::from(new_qty));
            (new_qty, new_invested, new_avg)
        }
        None => (quantity, total_amount, unit_price),
    };

    Ok(Position {
        user_id,
        symbol: symbol.to_string(),
        quantity: new_qty,
        average_cost: new_avg,
        total_invested: new_invested,
        updated_at: Utc::now(),
    })
}

/// Remove `quantity` from `position` at the stored average cost. The average
/// cost itself never changes on a sale; a position reaching zero is closed.
pub fn apply_sell(
    position: Option<&Position>,
    symbol: &str,
    quantity: Qty,
    unit_price: Money,
) -> Result<SellOutcome, LedgerError> {
    let held = position.map_or(0, |p| p.quantity);
    let pos = match position {
        Some(pos) if pos.quantity >= quantity => pos,
        _ => {
            return Err(LedgerError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: quantity,
                held,
            });
        }
    };

    let proceeds = notional(unit_price, quantity)?;
    let sold_investment = notional(pos.average_cost, quantity)?;
    let new_qty = pos.quantity - quantity;

    let remaining = (new_qty > 0).then(|| Position {
        quantity: new_qty,
        total_invested: pos.total_invested - sold_investment,
        updated_at: Utc::now(),
        ..pos.clone()
    });

    Ok(SellOutcome {
        remaining,
        sold_investment,
        realized_gain: proceeds - sold_investment,
    })
}

/// Market value minus invested capital.
pub fn unrealized_gain(position: &Position, current_price: Money) -> Money {
    current_price * Decimal::from(position.quantity) - position.total_invested
}
