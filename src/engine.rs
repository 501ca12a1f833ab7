//! Settlement engine: turns a trade intent into one atomic balance, position
//! and transaction-log update.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::locks::{UserGuard, UserLocks};
use crate::positions::{apply_buy, apply_sell};
use crate::quotes::QuoteSource;
use crate::store::{AccountStore, PositionStore, TransactionLog};
use crate::types::money::{notional, Money};
use crate::types::position::Position;
use crate::types::trade::{Side, TradeIntent, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest wait for a user's critical section.
    pub lock_timeout: Duration,
    /// Longest wait for the quote source.
    pub quote_timeout: Duration,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
    /// Backoff before attempt `n` is `n × retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            quote_timeout: Duration::from_secs(2),
            max_retries: 3,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

/// Validated, not-yet-written outcome of one settlement attempt.
struct Plan {
    prior_balance: Money,
    new_balance: Money,
    prior_position: Option<Position>,
    new_position: Option<Position>,
    transaction: Transaction,
    realized_gain: Option<Money>,
}

/// The three stores a settlement writes. Shared with the task that commits.
struct Ledger {
    accounts: Arc<dyn AccountStore>,
    positions: Arc<dyn PositionStore>,
    log: Arc<dyn TransactionLog>,
}

pub struct SettlementEngine {
    ledger: Arc<Ledger>,
    quotes: Arc<dyn QuoteSource>,
    locks: UserLocks,
    config: EngineConfig,
}

impl SettlementEngine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        positions: Arc<dyn PositionStore>,
        log: Arc<dyn TransactionLog>,
        quotes: Arc<dyn QuoteSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger: Arc::new(Ledger {
                accounts,
                positions,
                log,
            }),
            quotes,
            locks: UserLocks::new(),
            config,
        }
    }

    /// Settle a market buy or sell at the current quote.
    ///
    /// Either balance, position and log all change, or none do. Retryable
    /// failures are retried with the same captured price; if every attempt
    /// fails the last error is returned. Dropping the returned future before
    /// the user's lock is taken leaves the stores untouched; once it is taken
    /// the attempt runs to completion on its own task.
    pub async fn settle(&self, intent: TradeIntent) -> Result<Transaction, LedgerError> {
        if self.ledger.accounts.get_account(intent.user_id()).await?.is_none() {
            return Err(LedgerError::UnknownUser(intent.user_id()));
        }
        let unit_price = self.resolve_price(intent.symbol()).await?;

        let mut attempt = 0;
        loop {
            match self.try_settle(&intent, unit_price).await {
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        user_id = %intent.user_id(),
                        symbol = intent.symbol(),
                        attempt,
                        error = %err,
                        "retrying settlement"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(err) => {
                    warn!(
                        user_id = %intent.user_id(),
                        symbol = intent.symbol(),
                        side = %intent.side(),
                        quantity = intent.quantity(),
                        error = %err,
                        "settlement rejected"
                    );
                    return Err(err);
                }
                Ok(transaction) => return Ok(transaction),
            }
        }
    }

    /// Dry run of the same checks `settle` makes. Reserves nothing, so `true`
    /// can still be followed by a failed settlement.
    pub async fn can_settle(&self, intent: &TradeIntent) -> bool {
        let Ok(Some(account)) = self.ledger.accounts.get_account(intent.user_id()).await else {
            return false;
        };
        let Ok(unit_price) = self.resolve_price(intent.symbol()).await else {
            return false;
        };
        match intent.side() {
            Side::Buy => {
                notional(unit_price, intent.quantity()).is_ok_and(|total| account.balance >= total)
            }
            Side::Sell => self
                .ledger
                .positions
                .get_position(intent.user_id(), intent.symbol())
                .await
                .ok()
                .flatten()
                .is_some_and(|p| p.quantity >= intent.quantity()),
        }
    }

    async fn resolve_price(&self, symbol: &str) -> Result<Money, LedgerError> {
        tokio::time::timeout(self.config.quote_timeout, self.quotes.current_price(symbol))
            .await
            .map_err(|_| {
                LedgerError::unavailable(
                    "quote source",
                    format!("no price for {symbol} within {}ms", self.config.quote_timeout.as_millis()),
                )
            })?
    }

    async fn try_settle(&self, intent: &TradeIntent, unit_price: Money) -> Result<Transaction, LedgerError> {
        let guard = self
            .locks
            .acquire(intent.user_id(), self.config.lock_timeout)
            .await?;

        let ledger = Arc::clone(&self.ledger);
        let intent = intent.clone();
        tokio::spawn(async move { ledger.settle_locked(guard, &intent, unit_price).await })
            .await
            .map_err(|err| LedgerError::unavailable("settlement task", err.to_string()))?
    }
}

impl Ledger {
    /// Plan and commit while holding `_guard`, released when this returns.
    async fn settle_locked(
        &self,
        _guard: UserGuard,
        intent: &TradeIntent,
        unit_price: Money,
    ) -> Result<Transaction, LedgerError> {
        let plan = self.plan(intent, unit_price).await?;
        self.commit(&plan).await?;

        info!(
            transaction_id = %plan.transaction.id,
            user_id = %plan.transaction.user_id,
            symbol = %plan.transaction.symbol,
            side = %plan.transaction.side,
            quantity = plan.transaction.quantity,
            unit_price = %plan.transaction.unit_price,
            total_amount = %plan.transaction.total_amount,
            "trade settled"
        );
        if let Some(gain) = plan.realized_gain {
            debug!(transaction_id = %plan.transaction.id, realized_gain = %gain, "realized gain");
        }
        Ok(plan.transaction)
    }

    /// Fresh read and validation. Must run under the user's lock.
    async fn plan(&self, intent: &TradeIntent, unit_price: Money) -> Result<Plan, LedgerError> {
        let user_id = intent.user_id();
        let symbol = intent.symbol();
        let quantity = intent.quantity();

        let account = self
            .accounts
            .get_account(user_id)
            .await?
            .ok_or(LedgerError::UnknownUser(user_id))?;
        let prior_position = self.positions.get_position(user_id, symbol).await?;
        let total_amount = notional(unit_price, quantity)?;

        let (new_balance, new_position, realized_gain) = match intent.side() {
            Side::Buy => {
                if account.balance < total_amount {
                    return Err(LedgerError::InsufficientFunds {
                        need: total_amount,
                        available: account.balance,
                    });
                }
                let position = apply_buy(prior_position.as_ref(), user_id, symbol, quantity, unit_price)?;
                (account.balance - total_amount, Some(position), None)
            }
            Side::Sell => {
                let outcome = apply_sell(prior_position.as_ref(), symbol, quantity, unit_price)?;
                (
                    account.balance + total_amount,
                    outcome.remaining,
                    Some(outcome.realized_gain),
                )
            }
        };

        Ok(Plan {
            prior_balance: account.balance,
            new_balance,
            prior_position,
            new_position,
            transaction: Transaction {
                id: Uuid::new_v4(),
                user_id,
                symbol: symbol.to_string(),
                side: intent.side(),
                quantity,
                unit_price,
                total_amount,
                settled_at: Utc::now(),
            },
            realized_gain,
        })
    }

    /// Write balance, then position, then log. A failed write undoes the
    /// earlier ones before the error is returned.
    async fn commit(&self, plan: &Plan) -> Result<(), LedgerError> {
        let user_id = plan.transaction.user_id;

        self.accounts.set_balance(user_id, plan.new_balance).await?;

        if let Err(err) = self.write_position(user_id, &plan.transaction.symbol, plan.new_position.as_ref()).await {
            self.restore(plan).await;
            return Err(err);
        }

        if let Err(err) = self.log.append(&plan.transaction).await {
            self.restore(plan).await;
            return Err(err);
        }
        Ok(())
    }

    async fn write_position(
        &self,
        user_id: Uuid,
        symbol: &str,
        position: Option<&Position>,
    ) -> Result<(), LedgerError> {
        match position {
            Some(position) if position.quantity > 0 => self.positions.put_position(position).await,
            _ => self.positions.delete_position(user_id, symbol).await,
        }
    }

    /// Put back the prior position and balance. Rewriting the prior position
    /// is harmless when the failed write never landed.
    async fn restore(&self, plan: &Plan) {
        let user_id = plan.transaction.user_id;
        let symbol = &plan.transaction.symbol;

        if let Err(err) = self.write_position(user_id, symbol, plan.prior_position.as_ref()).await {
            error!(%user_id, symbol = %symbol, error = %err, "failed to restore position after aborted settlement");
        }
        if let Err(err) = self.accounts.set_balance(user_id, plan.prior_balance).await {
            error!(%user_id, error = %err, "failed to restore balance after aborted settlement");
        }
    }
}
