use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, PositionStore, TransactionLog};
use crate::error::LedgerError;
use crate::types::account::Account;
use crate::types::money::Money;
use crate::types::position::Position;
use crate::types::trade::Transaction;

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError> {
        Ok(self.accounts.read().await.get(&user_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        let username = username.trim().to_lowercase();
        let guard = self.accounts.read().await;
        Ok(guard.values().find(|a| a.username == username).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self.accounts.read().await.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, LedgerError> {
        let mut guard = self.accounts.write().await;
        if guard.contains_key(&account.id) || guard.values().any(|a| a.username == account.username) {
            return Ok(false);
        }
        guard.insert(account.id, account.clone());
        Ok(true)
    }

    async fn set_balance(&self, user_id: Uuid, balance: Money) -> Result<(), LedgerError> {
        match self.accounts.write().await.get_mut(&user_id) {
            Some(account) => {
                account.balance = balance;
                Ok(())
            }
            None => Err(LedgerError::UnknownUser(user_id)),
        }
    }
}

/// Keyed by user, then symbol, so a user's positions list in symbol order.
#[derive(Default)]
pub struct InMemoryPositions {
    positions: RwLock<HashMap<Uuid, BTreeMap<String, Position>>>,
}

impl InMemoryPositions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositions {
    async fn get_position(
        &self,
        user_id: Uuid,
        symbol: &str,
    ) -> Result<Option<Position>, LedgerError> {
        let guard = self.positions.read().await;
        Ok(guard.get(&user_id).and_then(|by_symbol| by_symbol.get(symbol)).cloned())
    }

    async fn list_positions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Position>, LedgerError> {
        let guard = self.positions.read().await;
        let Some(by_symbol) = guard.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(by_symbol
            .values()
            .filter(|p| symbol_filter.is_none_or(|s| p.symbol == s))
            .cloned()
            .collect())
    }

    async fn put_position(&self, position: &Position) -> Result<(), LedgerError> {
        let mut guard = self.positions.write().await;
        let by_symbol = guard.entry(position.user_id).or_default();
        if position.quantity == 0 {
            by_symbol.remove(&position.symbol);
        } else {
            by_symbol.insert(position.symbol.clone(), position.clone());
        }
        Ok(())
    }

    async fn delete_position(&self, user_id: Uuid, symbol: &str) -> Result<(), LedgerError> {
        let mut guard = self.positions.write().await;
        if let Some(by_symbol) = guard.get_mut(&user_id) {
            by_symbol.remove(symbol);
            if by_symbol.is_empty() {
                guard.remove(&user_id);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTransactionLog {
    entries: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.entries.write().await.push(transaction.clone());
        Ok(())
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let guard = self.entries.read().await;
        Ok(guard
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id && symbol_filter.is_none_or(|s| t.symbol == s))
            .cloned()
            .collect())
    }
}
