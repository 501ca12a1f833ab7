use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{portfolio, stocks, trades, users};
use crate::engine::{EngineConfig, SettlementEngine};
use crate::portfolio::Portfolio;
use crate::quotes::QuoteBoard;
use crate::store::{
    AccountStore, InMemoryAccounts, InMemoryPositions, InMemoryTransactionLog, PositionStore,
    TransactionLog,
};

/// Shared handles for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub portfolio: Portfolio,
    pub accounts: Arc<dyn AccountStore>,
    pub quotes: Arc<QuoteBoard>,
}

impl AppState {
    /// Wire the engine and queries over the given stores.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        positions: Arc<dyn PositionStore>,
        log: Arc<dyn TransactionLog>,
        quotes: Arc<QuoteBoard>,
        config: EngineConfig,
    ) -> Self {
        let engine = SettlementEngine::new(
            accounts.clone(),
            positions.clone(),
            log.clone(),
            quotes.clone(),
            config,
        );
        Self {
            engine: Arc::new(engine),
            portfolio: Portfolio::new(positions, log, quotes.clone()),
            accounts,
            quotes,
        }
    }

    pub fn in_memory(quotes: Arc<QuoteBoard>, config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryAccounts::new()),
            Arc::new(InMemoryPositions::new()),
            Arc::new(InMemoryTransactionLog::new()),
            quotes,
            config,
        )
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn home() -> &'static str {
    "Trading Simulator API is running!"
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/users", get(users::list_users).post(users::open_account))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/balance", get(users::get_balance))
        .route("/users/username/{username}", get(users::get_user_by_username))
        .route("/stocks", get(stocks::list_stocks))
        .route("/stocks/{symbol}", get(stocks::get_stock))
        .route("/stocks/{symbol}/quote", get(stocks::get_quote))
        .route("/stocks/{symbol}/realtime", get(stocks::get_quote))
        .route("/stocks/{symbol}/exists", get(stocks::stock_exists))
        .route("/trades", post(trades::execute_trade))
        .route("/trades/validate", post(trades::validate_trade))
        .route("/portfolio/user/{id}", get(portfolio::summaries))
        .route("/portfolio/user/{id}/value", get(portfolio::total_value))
        .route("/portfolio/user/{id}/gainloss", get(portfolio::total_gain_loss))
        .route("/portfolio/user/{id}/gainloss-percent", get(portfolio::total_gain_loss_percent))
        .route("/portfolio/user/{id}/invested", get(portfolio::total_invested))
        .route("/portfolio/user/{id}/transactions", get(portfolio::transactions))
        .route("/portfolio/user/{id}/transactions/{symbol}", get(portfolio::symbol_transactions))
        .route("/portfolio/user/{id}/position/{symbol}", get(portfolio::position))
        .route("/portfolio/user/{id}/shares/{symbol}", get(portfolio::available_shares))
        .route("/portfolio/user/{id}/has-position/{symbol}", get(portfolio::has_position))
        .with_state(state)
}
