//! Account persistence: balances and user lookup.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::account::Account;

/// Row returned from DB (username is stored lowercase).
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub username: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            username: row.username,
            balance: row.balance,
            created_at: row.created_at,
        }
    }
}

pub async fn get_account(pool: &PgPool, id: Uuid) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, balance, created_at FROM accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_account_by_username(
    pool: &PgPool,
    username_lowercase: &str,
) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, balance, created_at FROM accounts WHERE username = $1",
    )
    .bind(username_lowercase)
    .fetch_optional(pool)
    .await
}

pub async fn list_accounts(pool: &PgPool) -> Result<Vec<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, balance, created_at FROM accounts ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await
}

/// Insert an account. Returns `false` if the id or username already exists.
pub async fn insert_account(pool: &PgPool, account: &Account) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO accounts (id, username, balance, created_at) VALUES ($1, $2, $3, $4) \
         ON CONFLICT DO NOTHING",
    )
    .bind(account.id)
    .bind(&account.username)
    .bind(account.balance)
    .bind(account.created_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns the number of rows updated (0 when the account does not exist).
pub async fn update_balance(pool: &PgPool, id: Uuid, balance: Decimal) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
        .bind(balance)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
