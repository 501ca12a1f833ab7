//! Transaction log persistence: append on settlement, list for history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::trade::{Side, Transaction};

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// Skips rows with an unknown side or non-positive quantity.
fn transaction_row_to_transaction(row: TransactionRow) -> Option<Transaction> {
    let side: Side = row.side.parse().ok()?;
    let quantity = u64::try_from(row.quantity).ok().filter(|&q| q > 0)?;
    Some(Transaction {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol,
        side,
        quantity,
        unit_price: row.unit_price,
        total_amount: row.total_amount,
        settled_at: row.settled_at,
    })
}

/// Insert a single settled transaction. `seq` is assigned by the database.
pub async fn insert_transaction(
    pool: &PgPool,
    transaction: &Transaction,
    quantity: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO transactions (id, user_id, symbol, side, quantity, unit_price, total_amount, settled_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(transaction.id)
    .bind(transaction.user_id)
    .bind(&transaction.symbol)
    .bind(transaction.side.as_str())
    .bind(quantity)
    .bind(transaction.unit_price)
    .bind(transaction.total_amount)
    .bind(transaction.settled_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// List a user's transactions, optional symbol, most recently committed first.
pub async fn list_transactions_for_user(
    pool: &PgPool,
    user_id: Uuid,
    symbol_opt: Option<&str>,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = if let Some(symbol) = symbol_opt {
        sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, symbol, side, quantity, unit_price, total_amount, settled_at \
             FROM transactions WHERE user_id = $1 AND symbol = $2 ORDER BY seq DESC",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, symbol, side, quantity, unit_price, total_amount, settled_at \
             FROM transactions WHERE user_id = $1 ORDER BY seq DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
    };
    Ok(rows.into_iter().filter_map(transaction_row_to_transaction).collect())
}
