//! Storage contracts the settlement engine depends on, plus in-memory implementations.
//!
//! Each store keeps its own locking; none of them serialises a whole settlement.
//! That is the engine's job (see [`crate::locks`]).

mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::types::account::Account;
use crate::types::money::Money;
use crate::types::position::Position;
use crate::types::trade::Transaction;

pub use memory::{InMemoryAccounts, InMemoryPositions, InMemoryTransactionLog};

/// Per-user cash balances.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError>;

    /// Returns `false` when the id or (lowercase) username is already taken.
    async fn insert_account(&self, account: &Account) -> Result<bool, LedgerError>;

    /// Only the settlement engine calls this.
    async fn set_balance(&self, user_id: Uuid, balance: Money) -> Result<(), LedgerError>;
}

/// One record per (user, symbol); absent means no holding.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn get_position(&self, user_id: Uuid, symbol: &str)
    -> Result<Option<Position>, LedgerError>;

    /// Positions for a user, optional symbol filter, ordered by symbol.
    async fn list_positions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Position>, LedgerError>;

    async fn put_position(&self, position: &Position) -> Result<(), LedgerError>;

    async fn delete_position(&self, user_id: Uuid, symbol: &str) -> Result<(), LedgerError>;
}

/// Append-only trade history.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Most recently committed first.
    async fn list_transactions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError>;
}
