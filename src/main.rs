use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;
use trading_simulator::api::routes::{app_router, AppState};
use trading_simulator::config::Config;
use trading_simulator::persistence::{create_pool_and_migrate, PgStore};
use trading_simulator::quotes::QuoteBoard;
use trading_simulator::store::AccountStore;
use trading_simulator::types::account::Account;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Trading Simulator {} starting...", env!("CARGO_PKG_VERSION"));

    let quotes = Arc::new(QuoteBoard::with_default_catalog(config.quote_jitter).await);

    let state = match &config.database_url {
        Some(url) => {
            let pool = create_pool_and_migrate(url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            info!("Using PostgreSQL stores");
            let store = Arc::new(PgStore::new(pool));
            AppState::new(store.clone(), store.clone(), store, quotes, config.engine)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory stores");
            AppState::in_memory(quotes, config.engine)
        }
    };

    seed_demo_account(state.accounts.as_ref(), &config).await?;

    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

/// Open a "demo" account when no accounts exist yet.
async fn seed_demo_account(accounts: &dyn AccountStore, config: &Config) -> Result<()> {
    if !accounts.list_accounts().await?.is_empty() {
        return Ok(());
    }
    let demo = Account::open("demo", config.demo_balance);
    if accounts.insert_account(&demo).await? {
        info!(user_id = %demo.id, balance = %demo.balance, "seeded demo account");
    }
    Ok(())
}
