//! Database layer: pool, migrations, and PostgreSQL-backed stores for
//! accounts, positions and the transaction log.

mod accounts;
mod pool;
mod positions;
mod store;
mod transactions;

pub use accounts::{
    get_account, get_account_by_username, insert_account, list_accounts, update_balance,
    AccountRow,
};
pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{delete_position, get_position, list_positions_for_user, upsert_position, PositionRow};
pub use sqlx::PgPool;
pub use store::PgStore;
pub use transactions::{insert_transaction, list_transactions_for_user, TransactionRow};
