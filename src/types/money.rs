//! Monetary amounts and the rounding rules applied to them.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::LedgerError;

pub type Money = Decimal;
pub type Qty = u64;

/// Fractional digits kept on stored prices and average costs.
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits kept on a ratio before it is turned into a percentage.
pub const RATIO_SCALE: u32 = 4;

/// Round half-up to cents.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity × unit_price`, exact. Overflow is reported as an invalid quantity.
pub fn notional(unit_price: Money, quantity: Qty) -> Result<Money, LedgerError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| LedgerError::InvalidQuantity(quantity.to_string()))
}

/// Quantity as stored in a signed BIGINT column.
pub fn stored_quantity(quantity: Qty) -> Result<i64, LedgerError> {
    i64::try_from(quantity).map_err(|_| LedgerError::InvalidQuantity(quantity.to_string()))
}

/// `numerator / denominator` as a percentage, zero when the denominator is not positive.
pub fn percent_of(numerator: Money, denominator: Money) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let ratio = (numerator / denominator)
        .round_dp_with_strategy(RATIO_SCALE, RoundingStrategy::MidpointAwayFromZero);
    ratio * Decimal::ONE_HUNDRED
}
