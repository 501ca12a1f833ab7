//! Paper-trading ledger: market buys and sells settled against a cash balance,
//! an average-cost position ledger and an append-only transaction log.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod persistence;
pub mod portfolio;
pub mod positions;
pub mod quotes;
pub mod store;
pub mod types;
