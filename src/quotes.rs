//! Quote resolution: the `QuoteSource` contract and `QuoteBoard`, an in-memory
//! stock catalog that can jitter prices to simulate a moving market.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::types::money::{percent_of, round_money, Money};
use crate::types::quote::{Quote, Stock};
use crate::types::trade::normalize_symbol;

/// Price shown for a symbol the catalog does not know.
pub const DEFAULT_DISPLAY_PRICE: Money = Decimal::ONE_HUNDRED;
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Current unit price used for settlement. Does not move the market.
    async fn current_price(&self, symbol: &str) -> Result<Money, LedgerError>;

    /// A fresh quote; simulated sources may move the price.
    async fn quote(&self, symbol: &str) -> Result<Quote, LedgerError>;

    async fn stock(&self, symbol: &str) -> Result<Option<Stock>, LedgerError>;

    async fn list_stocks(&self) -> Result<Vec<Stock>, LedgerError>;
}

/// Quote for display. Falls back to a default quote when the symbol cannot be
/// resolved; never use this for settlement.
pub async fn display_quote(source: &dyn QuoteSource, symbol: &str) -> Quote {
    match source.quote(symbol).await {
        Ok(quote) => quote,
        Err(err) => {
            tracing::debug!(symbol, error = %err, "using default display quote");
            Quote {
                symbol: normalize_symbol(symbol),
                company_name: UNKNOWN_COMPANY.to_string(),
                price: DEFAULT_DISPLAY_PRICE,
                change: Decimal::ZERO,
                change_percent: Decimal::ZERO,
                last_updated: None,
            }
        }
    }
}

/// Stock catalog keyed by upper-case symbol.
///
/// With a non-zero `jitter`, every [`QuoteSource::quote`] call moves the stored
/// price by a random fraction in `[-jitter/2, +jitter/2)`. A zero jitter gives
/// a static price table.
pub struct QuoteBoard {
    stocks: RwLock<BTreeMap<String, Stock>>,
    jitter: f64,
}

impl QuoteBoard {
    pub fn new(jitter: f64) -> Self {
        Self {
            stocks: RwLock::new(BTreeMap::new()),
            jitter: jitter.max(0.0),
        }
    }

    /// Static table: quotes never move unless [`QuoteBoard::update_price`] is called.
    pub fn fixed() -> Self {
        Self::new(0.0)
    }

    pub async fn with_default_catalog(jitter: f64) -> Self {
        let board = Self::new(jitter);
        for (symbol, company, price) in DEFAULT_CATALOG {
            // Literals above are valid decimals.
            if let Ok(price) = Decimal::from_str(price) {
                board.list(symbol, company, price).await;
            }
        }
        board
    }

    /// Add or replace a stock.
    pub async fn list(&self, symbol: &str, company_name: &str, price: Money) {
        let symbol = normalize_symbol(symbol);
        let stock = Stock {
            symbol: symbol.clone(),
            company_name: company_name.to_string(),
            current_price: round_money(price),
            last_updated: Utc::now(),
        };
        self.stocks.write().await.insert(symbol, stock);
    }

    pub async fn update_price(&self, symbol: &str, price: Money) -> Result<(), LedgerError> {
        let symbol = normalize_symbol(symbol);
        let mut guard = self.stocks.write().await;
        let stock = guard
            .get_mut(&symbol)
            .ok_or(LedgerError::UnknownSymbol(symbol.clone()))?;
        stock.current_price = round_money(price);
        stock.last_updated = Utc::now();
        Ok(())
    }

    pub async fn stock_exists(&self, symbol: &str) -> bool {
        self.stocks.read().await.contains_key(&normalize_symbol(symbol))
    }

    fn random_change(&self, price: Money) -> Money {
        if self.jitter == 0.0 {
            return Decimal::ZERO;
        }
        let pct = (rand::rng().random::<f64>() - 0.5) * self.jitter;
        let pct = Decimal::from_f64(pct).unwrap_or_default();
        round_money(price * pct)
    }
}

#[async_trait]
impl QuoteSource for QuoteBoard {
    async fn current_price(&self, symbol: &str) -> Result<Money, LedgerError> {
        let symbol = normalize_symbol(symbol);
        self.stocks
            .read()
            .await
            .get(&symbol)
            .map(|s| s.current_price)
            .ok_or(LedgerError::UnknownSymbol(symbol))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, LedgerError> {
        let symbol = normalize_symbol(symbol);
        let mut guard = self.stocks.write().await;
        let stock = guard
            .get_mut(&symbol)
            .ok_or(LedgerError::UnknownSymbol(symbol.clone()))?;

        let previous = stock.current_price;
        let change = self.random_change(previous);
        if change != Decimal::ZERO {
            stock.current_price = previous + change;
            stock.last_updated = Utc::now();
        }

        Ok(Quote {
            symbol: stock.symbol.clone(),
            company_name: stock.company_name.clone(),
            price: stock.current_price,
            change,
            change_percent: percent_of(change, previous),
            last_updated: Some(stock.last_updated),
        })
    }

    async fn stock(&self, symbol: &str) -> Result<Option<Stock>, LedgerError> {
        Ok(self.stocks.read().await.get(&normalize_symbol(symbol)).cloned())
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, LedgerError> {
        Ok(self.stocks.read().await.values().cloned().collect())
    }
}

const DEFAULT_CATALOG: [(&str, &str, &str); 8] = [
    ("AAPL", "Apple Inc.", "175.50"),
    ("GOOGL", "Alphabet Inc.", "138.25"),
    ("MSFT", "Microsoft Corporation", "378.85"),
    ("AMZN", "Amazon.com Inc.", "145.30"),
    ("TSLA", "Tesla Inc.", "248.50"),
    ("NVDA", "NVIDIA Corporation", "485.20"),
    ("META", "Meta Platforms Inc.", "325.75"),
    ("NFLX", "Netflix Inc.", "445.60"),
];
