//! Per-txid lock table (design note in spec §9): one mutex per in-flight
//! txid, lazily created on first acquire and removed once uncontended.
//!
//! Uses a refcount rather than "delete on release when unlocked" directly:
//! deleting the moment a lock becomes free races a waiter that already
//! holds a clone of the (about to be removed) `Arc` but hasn't registered
//! itself in the table yet. Refcounting under the table's own mutex makes
//! create/destroy atomic with respect to concurrent acquires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;

struct Entry {
    lock: Arc<AsyncMutex<()>>,
    refs: usize,
}

/// A guard that, when dropped, releases the per-txid lock and removes the
/// table entry if no other waiter is referencing it.
pub struct TxidGuard<'a> {
    table: &'a TxidLockTable,
    txid: String,
    _permit: tokio::sync::OwnedMutexGuard<()>,
}

impl<'a> Drop for TxidGuard<'a> {
    fn drop(&mut self) {
        self.table.release(&self.txid);
    }
}

#[derive(Default)]
pub struct TxidLockTable {
    entries: StdMutex<HashMap<String, Entry>>,
}

impl TxidLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `txid`, creating its entry on demand. Returns a
    /// guard that releases and garbage-collects the entry on drop.
    pub async fn acquire(&self, txid: &str) -> TxidGuard<'_> {
        let lock = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(txid.to_string()).or_insert_with(|| Entry {
                lock: Arc::new(AsyncMutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            entry.lock.clone()
        };
        let permit = lock.lock_owned().await;
        TxidGuard { table: self, txid: txid.to_string(), _permit: permit }
    }

    fn release(&self, txid: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(txid) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(txid);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn table_is_empty_after_single_acquire_release() {
        let table = TxidLockTable::new();
        {
            let _guard = table.acquire("abc").await;
            assert_eq!(table.len(), 1);
        }
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_waiters_serialize_and_table_drains() {
        let table = Arc::new(TxidLockTable::new());
        let order = Arc::new(StdMutex::new(Vec::new()));

        let t1 = {
            let table = table.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = table.acquire("shared").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                order.lock().unwrap().push(1);
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let t2 = {
            let table = table.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _g = table.acquire("shared").await;
                order.lock().unwrap().push(2);
            })
        };

        t1.await.unwrap();
        t2.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        assert_eq!(table.len(), 0);
    }
}
