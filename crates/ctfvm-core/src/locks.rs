//! Key-scoped mutual exclusion.
//!
//! Every key gets its own async mutex, created on first use and dropped from
//! the table once nobody holds or waits for it. Holders of different keys
//! never contend; holders of the same key are served in FIFO order.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Table<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

pub struct KeyLocks<K> {
    table: Table<K>,
}

impl<K> KeyLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &K) -> KeyGuard<K> {
        let slot = {
            let mut table = lock_table(&self.table);
            Arc::clone(table.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;

        KeyGuard {
            key: key.clone(),
            slot,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for KeyLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one key; released on drop.
pub struct KeyGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    table: Table<K>,
}

impl<K> KeyGuard<K>
where
    K: Eq + Hash,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        drop(self.guard.take());

        // Only the table and this guard still reference the slot: no waiter can
        // appear while the table lock is held, so the entry can go.
        let mut table = lock_table(&self.table);
        if Arc::strong_count(&self.slot) == 2 {
            table.remove(&self.key);
        }
    }
}

fn lock_table<K>(table: &Table<K>) -> MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
