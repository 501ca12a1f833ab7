use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{accounts, positions, transactions};
use crate::error::LedgerError;
use crate::store::{AccountStore, PositionStore, TransactionLog};
use crate::types::account::Account;
use crate::types::money::{stored_quantity, Money};
use crate::types::position::Position;
use crate::types::trade::Transaction;

/// SQLSTATE codes Postgres uses for transient write conflicts.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && matches!(db_err.code().as_deref(), Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED))
        {
            return LedgerError::ConcurrencyConflict(db_err.message().to_string());
        }
        LedgerError::unavailable("database", err.to_string())
    }
}

/// All three ledger stores over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError> {
        Ok(accounts::get_account(&self.pool, user_id).await?.map(Account::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        let username = username.trim().to_lowercase();
        Ok(accounts::get_account_by_username(&self.pool, &username)
            .await?
            .map(Account::from))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let rows = accounts::list_accounts(&self.pool).await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, LedgerError> {
        Ok(accounts::insert_account(&self.pool, account).await?)
    }

    async fn set_balance(&self, user_id: Uuid, balance: Money) -> Result<(), LedgerError> {
        match accounts::update_balance(&self.pool, user_id, balance).await? {
            0 => Err(LedgerError::UnknownUser(user_id)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PositionStore for PgStore {
    async fn get_position(
        &self,
        user_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Position>, LedgerError> {
        let row = positions::get_position(&self.pool, user_id, symbol).await?;
        Ok(row.and_then(positions::position_row_to_position))
    }

    async fn list_positions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Position>, LedgerError> {
        let rows = positions::list_positions_for_user(&self.pool, user_id, symbol_filter).await?;
        Ok(rows
            .into_iter()
            .filter_map(positions::position_row_to_position)
            .collect())
    }

    async fn put_position(&self, position: &Position) -> Result<(), LedgerError> {
        if position.quantity == 0 {
            positions::delete_position(&self.pool, position.user_id, &position.symbol).await?;
        } else {
            let quantity = stored_quantity(position.quantity)?;
            positions::upsert_position(&self.pool, position, quantity).await?;
        }
        Ok(())
    }

    async fn delete_position(&self, user_id: Uuid, symbol: &str) -> Result<(), LedgerError> {
        Ok(positions::delete_position(&self.pool, user_id, symbol).await?)
    }
}

#[async_trait]
impl TransactionLog for PgStore {
    async fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let quantity = stored_quantity(transaction.quantity)?;
        Ok(transactions::insert_transaction(&self.pool, transaction, quantity).await?)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        Ok(transactions::list_transactions_for_user(&self.pool, user_id, symbol_filter).await?)
    }
}
