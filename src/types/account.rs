use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::money::Money;

/// A user's cash account. Username is stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(username: &str, balance: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.trim().to_lowercase(),
            balance,
            created_at: Utc::now(),
        }
    }
}
