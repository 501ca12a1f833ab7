//! Position persistence: upsert, delete, and lookup per (user, symbol).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::position::Position;

#[derive(Debug, sqlx::FromRow)]
pub struct PositionRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub total_invested: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Rows with a non-positive quantity are treated as absent.
pub fn position_row_to_position(row: PositionRow) -> Option<Position> {
    let quantity = u64::try_from(row.quantity).ok().filter(|&q| q > 0)?;
    Some(Position {
        user_id: row.user_id,
        symbol: row.symbol,
        quantity,
        average_cost: row.average_cost,
        total_invested: row.total_invested,
        updated_at: row.updated_at,
    })
}

/// Upsert a position (insert or update on conflict).
/// `quantity` is the position's share count already converted to the column type.
pub async fn upsert_position(pool: &PgPool, position: &Position, quantity: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO positions (user_id, symbol, quantity, average_cost, total_invested, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_id, symbol) DO UPDATE \
         SET quantity = $3, average_cost = $4, total_invested = $5, updated_at = $6",
    )
    .bind(position.user_id)
    .bind(&position.symbol)
    .bind(quantity)
    .bind(position.average_cost)
    .bind(position.total_invested)
    .bind(position.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_position(pool: &PgPool, user_id: Uuid, symbol: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM positions WHERE user_id = $1 AND symbol = $2")
        .bind(user_id)
        .bind(symbol)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_position(
    pool: &PgPool,
    user_id: Uuid,
    symbol: &str,
) -> Result<Option<PositionRow>, sqlx::Error> {
    sqlx::query_as::<_, PositionRow>(
        "SELECT user_id, symbol, quantity, average_cost, total_invested, updated_at \
         FROM positions WHERE user_id = $1 AND symbol = $2",
    )
    .bind(user_id)
    .bind(symbol)
    .fetch_optional(pool)
    .await
}

/// List positions for a user, optional symbol filter (for GET /portfolio).
pub async fn list_positions_for_user(
    pool: &PgPool,
    user_id: Uuid,
    symbol_filter: Option<&str>,
) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = if let Some(symbol) = symbol_filter {
        sqlx::query_as::<_, PositionRow>(
            "SELECT user_id, symbol, quantity, average_cost, total_invested, updated_at \
             FROM positions WHERE user_id = $1 AND symbol = $2 ORDER BY symbol",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, PositionRow>(
            "SELECT user_id, symbol, quantity, average_cost, total_invested, updated_at \
             FROM positions WHERE user_id = $1 ORDER BY symbol",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
    };
    Ok(rows)
}
