//! Settlement engine integration tests: buy/sell accounting, atomicity,
//! retries, and concurrent settlements for one user.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trading_simulator::engine::{EngineConfig, SettlementEngine};
use trading_simulator::error::LedgerError;
use trading_simulator::quotes::QuoteBoard;
use trading_simulator::store::{
    AccountStore, InMemoryAccounts, InMemoryPositions, InMemoryTransactionLog, PositionStore,
    TransactionLog,
};
use trading_simulator::types::account::Account;
use trading_simulator::types::money::Money;
use trading_simulator::types::position::Position;
use trading_simulator::types::trade::{Side, TradeIntent, Transaction};
use uuid::Uuid;

struct Harness {
    engine: Arc<SettlementEngine>,
    accounts: Arc<InMemoryAccounts>,
    positions: Arc<InMemoryPositions>,
    log: Arc<dyn TransactionLog>,
    quotes: Arc<QuoteBoard>,
    user_id: Uuid,
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    balance: Money,
    positions: Vec<Position>,
    log: Vec<Transaction>,
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        lock_timeout: Duration::from_secs(5),
        quote_timeout: Duration::from_secs(1),
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
    }
}

async fn quote_board() -> Arc<QuoteBoard> {
    let quotes = QuoteBoard::fixed();
    quotes.list("AAPL", "Apple Inc.", dec!(100)).await;
    quotes.list("MSFT", "Microsoft Corporation", dec!(250.50)).await;
    Arc::new(quotes)
}

async fn harness_with(balance: Money, log: Arc<dyn TransactionLog>, config: EngineConfig) -> Harness {
    let accounts = Arc::new(InMemoryAccounts::new());
    let positions = Arc::new(InMemoryPositions::new());
    let quotes = quote_board().await;

    let account = Account::open("alice", balance);
    assert!(accounts.insert_account(&account).await.unwrap());

    let engine = SettlementEngine::new(
        accounts.clone(),
        positions.clone(),
        log.clone(),
        quotes.clone(),
        config,
    );
    Harness {
        engine: Arc::new(engine),
        accounts,
        positions,
        log,
        quotes,
        user_id: account.id,
    }
}

async fn harness(balance: Money) -> Harness {
    harness_with(balance, Arc::new(InMemoryTransactionLog::new()), fast_config()).await
}

impl Harness {
    fn intent(&self, symbol: &str, side: Side, quantity: i64) -> TradeIntent {
        TradeIntent::new(self.user_id, symbol, side, quantity).unwrap()
    }

    async fn buy(&self, symbol: &str, quantity: i64) -> Result<Transaction, LedgerError> {
        self.engine.settle(self.intent(symbol, Side::Buy, quantity)).await
    }

    async fn sell(&self, symbol: &str, quantity: i64) -> Result<Transaction, LedgerError> {
        self.engine.settle(self.intent(symbol, Side::Sell, quantity)).await
    }

    async fn balance(&self) -> Money {
        self.accounts
            .get_account(self.user_id)
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    async fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.get_position(self.user_id, symbol).await.unwrap()
    }

    async fn history(&self) -> Vec<Transaction> {
        self.log.list_transactions(self.user_id, None).await.unwrap()
    }

    async fn snapshot(&self) -> Snapshot {
        Snapshot {
            balance: self.balance().await,
            positions: self.positions.list_positions(self.user_id, None).await.unwrap(),
            log: self.history().await,
        }
    }
}

// --- Accounting ---

#[tokio::test]
async fn buy_debits_balance_and_opens_position() {
    let h = harness(dec!(10000)).await;

    let tx = h.buy("aapl", 10).await.unwrap();

    assert_eq!(tx.symbol, "AAPL");
    assert_eq!(tx.side, Side::Buy);
    assert_eq!(tx.quantity, 10);
    assert_eq!(tx.unit_price, dec!(100));
    assert_eq!(tx.total_amount, dec!(1000));
    assert_eq!(h.balance().await, dec!(9000));

    let pos = h.position("AAPL").await.unwrap();
    assert_eq!(pos.quantity, 10);
    assert_eq!(pos.average_cost, dec!(100));
    assert_eq!(pos.total_invested, dec!(1000));
}

#[tokio::test]
async fn buys_at_two_prices_weight_the_average() {
    let h = harness(dec!(10000)).await;

    h.buy("AAPL", 10).await.unwrap();
    h.quotes.update_price("AAPL", dec!(200)).await.unwrap();
    h.buy("AAPL", 10).await.unwrap();

    let pos = h.position("AAPL").await.unwrap();
    assert_eq!(pos.quantity, 20);
    assert_eq!(pos.total_invested, dec!(3000));
    assert_eq!(pos.average_cost, dec!(150.00));
    assert_eq!(h.balance().await, dec!(7000));
}

#[tokio::test]
async fn sell_credits_balance_and_keeps_average_cost() {
    let h = harness(dec!(10000)).await;
    h.buy("AAPL", 10).await.unwrap();
    h.quotes.update_price("AAPL", dec!(200)).await.unwrap();
    h.buy("AAPL", 10).await.unwrap();
    h.quotes.update_price("AAPL", dec!(180)).await.unwrap();

    let tx = h.sell("AAPL", 5).await.unwrap();

    assert_eq!(tx.side, Side::Sell);
    assert_eq!(tx.total_amount, dec!(900));
    assert_eq!(h.balance().await, dec!(7900));
    let pos = h.position("AAPL").await.unwrap();
    assert_eq!(pos.quantity, 15);
    assert_eq!(pos.total_invested, dec!(2250));
    assert_eq!(pos.average_cost, dec!(150.00));
}

#[tokio::test]
async fn full_liquidation_removes_position() {
    let h = harness(dec!(10000)).await;
    h.buy("MSFT", 4).await.unwrap();

    h.sell("MSFT", 4).await.unwrap();

    assert!(h.position("MSFT").await.is_none());
    assert!(h.positions.list_positions(h.user_id, None).await.unwrap().is_empty());
    assert_eq!(h.balance().await, dec!(10000));
}

#[tokio::test]
async fn balance_reconciles_with_log() {
    let h = harness(dec!(5000)).await;

    h.buy("AAPL", 12).await.unwrap();
    h.buy("MSFT", 3).await.unwrap();
    h.quotes.update_price("AAPL", dec!(97.35)).await.unwrap();
    h.sell("AAPL", 5).await.unwrap();
    h.buy("AAPL", 2).await.unwrap();
    h.quotes.update_price("MSFT", dec!(260.01)).await.unwrap();
    h.sell("MSFT", 3).await.unwrap();
    assert!(h.sell("MSFT", 1).await.is_err());

    let log = h.history().await;
    assert_eq!(log.len(), 5);
    let net: Decimal = log
        .iter()
        .map(|t| match t.side {
            Side::Buy => -t.total_amount,
            Side::Sell => t.total_amount,
        })
        .sum();
    assert_eq!(h.balance().await, dec!(5000) + net);
}

#[tokio::test]
async fn log_lists_most_recent_first_and_filters_by_symbol() {
    let h = harness(dec!(10000)).await;
    let first = h.buy("AAPL", 1).await.unwrap();
    let second = h.buy("MSFT", 1).await.unwrap();
    let third = h.sell("AAPL", 1).await.unwrap();

    let all = h.history().await;
    let ids: Vec<Uuid> = all.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let aapl = h.log.list_transactions(h.user_id, Some("AAPL")).await.unwrap();
    assert_eq!(aapl.len(), 2);
    assert_eq!(aapl[0].id, third.id);
}

// --- Rejections ---

#[tokio::test]
async fn oversell_leaves_everything_unchanged() {
    let h = harness(dec!(10000)).await;
    h.buy("AAPL", 3).await.unwrap();
    let before = h.snapshot().await;

    let err = h.sell("AAPL", 4).await.unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientShares {
            symbol: "AAPL".into(),
            requested: 4,
            held: 3,
        }
    );
    assert_eq!(h.snapshot().await, before);
}

#[tokio::test]
async fn sell_without_position_is_insufficient_shares() {
    let h = harness(dec!(10000)).await;
    let err = h.sell("MSFT", 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientShares { held: 0, .. }));
    assert!(h.history().await.is_empty());
}

#[tokio::test]
async fn unaffordable_buy_is_insufficient_funds() {
    let h = harness(dec!(999.99)).await;

    let err = h.buy("AAPL", 10).await.unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientFunds {
            need: dec!(1000),
            available: dec!(999.99),
        }
    );
    assert_eq!(h.balance().await, dec!(999.99));
    assert!(h.position("AAPL").await.is_none());
    assert!(h.history().await.is_empty());
}

#[tokio::test]
async fn buy_of_exact_balance_succeeds() {
    let h = harness(dec!(1000)).await;
    h.buy("AAPL", 10).await.unwrap();
    assert_eq!(h.balance().await, Decimal::ZERO);
}

#[tokio::test]
async fn unknown_user_and_symbol_are_rejected() {
    let h = harness(dec!(1000)).await;

    let stranger = TradeIntent::new(Uuid::new_v4(), "AAPL", Side::Buy, 1).unwrap();
    assert!(matches!(
        h.engine.settle(stranger).await.unwrap_err(),
        LedgerError::UnknownUser(_)
    ));

    assert_eq!(
        h.buy("ZZZZ", 1).await.unwrap_err(),
        LedgerError::UnknownSymbol("ZZZZ".into())
    );
    assert!(h.history().await.is_empty());
}

// --- can_settle ---

#[tokio::test]
async fn can_settle_mirrors_validation_without_mutating() {
    let h = harness(dec!(500)).await;

    assert!(h.engine.can_settle(&h.intent("AAPL", Side::Buy, 5)).await);
    assert!(!h.engine.can_settle(&h.intent("AAPL", Side::Buy, 6)).await);
    assert!(!h.engine.can_settle(&h.intent("AAPL", Side::Sell, 1)).await);
    assert!(!h.engine.can_settle(&h.intent("NOPE", Side::Buy, 1)).await);
    let stranger = TradeIntent::new(Uuid::new_v4(), "AAPL", Side::Buy, 1).unwrap();
    assert!(!h.engine.can_settle(&stranger).await);

    h.buy("AAPL", 2).await.unwrap();
    assert!(h.engine.can_settle(&h.intent("AAPL", Side::Sell, 2)).await);
    assert!(!h.engine.can_settle(&h.intent("AAPL", Side::Sell, 3)).await);

    assert_eq!(h.balance().await, dec!(300));
    assert_eq!(h.position("AAPL").await.unwrap().quantity, 2);
}

// --- Concurrency ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buys_never_overspend() {
    let h = Arc::new(harness(dec!(1000)).await);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.buy("AAPL", 1).await }));
    }

    let mut successes = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientFunds { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 10);
    assert_eq!(rejected, 15);
    assert_eq!(h.balance().await, Decimal::ZERO);
    let pos = h.position("AAPL").await.unwrap();
    assert_eq!(pos.quantity, 10);
    assert_eq!(pos.total_invested, dec!(1000));
    assert_eq!(h.history().await.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sells_never_oversell() {
    let h = Arc::new(harness(dec!(1000)).await);
    h.buy("AAPL", 6).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = h.clone();
        handles.push(tokio::spawn(async move { h.sell("AAPL", 1).await }));
    }
    let results: Vec<_> = futures_results(handles).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 6);
    assert!(h.position("AAPL").await.is_none());
    assert_eq!(h.balance().await, dec!(1000));
}

async fn futures_results(
    handles: Vec<tokio::task::JoinHandle<Result<Transaction, LedgerError>>>,
) -> Vec<Result<Transaction, LedgerError>> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

// --- Partial failure and retries ---

/// Transaction log that fails the first `failures` appends.
struct FlakyLog {
    inner: InMemoryTransactionLog,
    failures: AtomicU32,
    error: LedgerError,
}

impl FlakyLog {
    fn new(failures: u32, error: LedgerError) -> Self {
        Self {
            inner: InMemoryTransactionLog::new(),
            failures: AtomicU32::new(failures),
            error,
        }
    }
}

#[async_trait]
impl TransactionLog for FlakyLog {
    async fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        self.inner.append(transaction).await
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.list_transactions(user_id, symbol_filter).await
    }
}

#[tokio::test]
async fn failed_log_append_rolls_back_balance_and_position() {
    let failing = Arc::new(FlakyLog::new(u32::MAX, LedgerError::unavailable("log", "disk full")));
    let h = harness_with(dec!(1000), failing, fast_config()).await;

    let err = h.buy("AAPL", 3).await.unwrap_err();

    assert!(matches!(err, LedgerError::CollaboratorUnavailable { .. }));
    assert_eq!(h.balance().await, dec!(1000));
    assert!(h.position("AAPL").await.is_none());
    assert!(h.history().await.is_empty());
}

#[tokio::test]
async fn failed_sell_append_restores_prior_position() {
    let flaky = Arc::new(FlakyLog::new(0, LedgerError::unavailable("log", "disk full")));
    let config = EngineConfig {
        max_retries: 0,
        ..fast_config()
    };
    let h = harness_with(dec!(1000), flaky.clone(), config).await;
    h.buy("AAPL", 4).await.unwrap();
    let before = h.snapshot().await;

    flaky.failures.store(1, Ordering::SeqCst);
    assert!(h.sell("AAPL", 4).await.is_err());

    assert_eq!(h.snapshot().await, before);
}

#[tokio::test]
async fn transient_conflict_is_retried_once_and_applied_once() {
    let flaky = Arc::new(FlakyLog::new(1, LedgerError::ConcurrencyConflict("busy".into())));
    let h = harness_with(dec!(1000), flaky, fast_config()).await;

    let tx = h.buy("AAPL", 2).await.unwrap();

    assert_eq!(h.balance().await, dec!(800));
    assert_eq!(h.position("AAPL").await.unwrap().quantity, 2);
    let entries = h.history().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].total_amount, tx.total_amount);
}

/// Account store whose balance writes stall, keeping the user's lock held.
struct SlowAccounts {
    inner: InMemoryAccounts,
    delay: Duration,
}

#[async_trait]
impl AccountStore for SlowAccounts {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, LedgerError> {
        self.inner.get_account(user_id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        self.inner.find_by_username(username).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.inner.list_accounts().await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, LedgerError> {
        self.inner.insert_account(account).await
    }

    async fn set_balance(&self, user_id: Uuid, balance: Money) -> Result<(), LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_balance(user_id, balance).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_timeout_fails_without_side_effects() {
    let accounts = Arc::new(SlowAccounts {
        inner: InMemoryAccounts::new(),
        delay: Duration::from_millis(300),
    });
    let positions = Arc::new(InMemoryPositions::new());
    let log = Arc::new(InMemoryTransactionLog::new());
    let account = Account::open("bob", dec!(1000));
    accounts.insert_account(&account).await.unwrap();

    let engine = Arc::new(SettlementEngine::new(
        accounts.clone(),
        positions.clone(),
        log.clone(),
        quote_board().await,
        EngineConfig {
            lock_timeout: Duration::from_millis(20),
            max_retries: 0,
            ..fast_config()
        },
    ));

    let slow = {
        let engine = engine.clone();
        let intent = TradeIntent::new(account.id, "AAPL", Side::Buy, 3).unwrap();
        tokio::spawn(async move { engine.settle(intent).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let blocked = TradeIntent::new(account.id, "AAPL", Side::Buy, 1).unwrap();
    let err = engine.settle(blocked).await.unwrap_err();
    assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));
    assert!(err.is_retryable());

    slow.await.unwrap().unwrap();
    let balance = accounts.get_account(account.id).await.unwrap().unwrap().balance;
    assert_eq!(balance, dec!(700));
    assert_eq!(positions.get_position(account.id, "AAPL").await.unwrap().unwrap().quantity, 3);
    assert_eq!(log.len().await, 1);
}

/// Transaction log whose appends stall, so a settlement is mid-commit for `delay`.
struct SlowLog {
    inner: InMemoryTransactionLog,
    delay: Duration,
}

#[async_trait]
impl TransactionLog for SlowLog {
    async fn append(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.append(transaction).await
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.list_transactions(user_id, symbol_filter).await
    }
}

#[tokio::test]
async fn dropped_caller_does_not_leave_a_partial_settlement() {
    let slow = Arc::new(SlowLog {
        inner: InMemoryTransactionLog::new(),
        delay: Duration::from_millis(200),
    });
    let h = harness_with(dec!(1000), slow.clone(), fast_config()).await;

    let abandoned = tokio::time::timeout(Duration::from_millis(50), h.buy("AAPL", 3)).await;
    assert!(abandoned.is_err(), "caller should give up before the log append finishes");
    assert!(slow.inner.is_empty().await);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.balance().await, dec!(700));
    assert_eq!(h.position("AAPL").await.unwrap().quantity, 3);
    assert_eq!(slow.inner.len().await, 1);

    // The lock went with the finished task.
    h.buy("AAPL", 1).await.unwrap();
    assert_eq!(h.history().await.len(), 2);
}

#[tokio::test]
async fn dropped_while_waiting_for_lock_has_no_effect() {
    let slow = Arc::new(SlowLog {
        inner: InMemoryTransactionLog::new(),
        delay: Duration::from_millis(200),
    });
    let h = harness_with(dec!(1000), slow, fast_config()).await;

    let first = {
        let engine = h.engine.clone();
        let intent = h.intent("AAPL", Side::Buy, 3);
        tokio::spawn(async move { engine.settle(intent).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiting = tokio::time::timeout(Duration::from_millis(50), h.buy("AAPL", 2)).await;
    assert!(waiting.is_err());

    first.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.balance().await, dec!(700));
    assert_eq!(h.position("AAPL").await.unwrap().quantity, 3);
    assert_eq!(h.history().await.len(), 1);
}
