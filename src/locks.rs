//! Per-user critical sections. At most one settlement per user runs at a time;
//! different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::LedgerError;

type LockMap = Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>;

/// Only users with a held or awaited lock have an entry.
#[derive(Default)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

/// Held for the whole read-validate-write of one settlement.
#[derive(Debug)]
pub struct UserGuard {
    user_id: Uuid,
    locks: Arc<LockMap>,
    _guard: OwnedMutexGuard<()>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(user_id).or_default().clone()
    }

    /// Wait up to `wait` for the user's lock. Giving up has no side effects.
    pub async fn acquire(&self, user_id: Uuid, wait: Duration) -> Result<UserGuard, LedgerError> {
        let lock = self.lock_for(user_id);
        let guard = tokio::time::timeout(wait, lock.lock_owned())
            .await
            .map_err(|_| {
                LedgerError::ConcurrencyConflict(format!(
                    "timed out after {}ms waiting for user {user_id}",
                    wait.as_millis()
                ))
            })?;
        Ok(UserGuard {
            user_id,
            locks: Arc::clone(&self.locks),
            _guard: guard,
        })
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and this guard are the only holders: nobody is waiting.
        if let Some(lock) = map.get(&self.user_id)
            && Arc::strong_count(lock) == 2
        {
            map.remove(&self.user_id);
        }
    }
}
