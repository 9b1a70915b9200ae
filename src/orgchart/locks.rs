//! Per-department async locks.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes workflows that touch the same departments.
///
/// Locks are taken in ascending id order so two workflows sharing several
/// departments cannot deadlock.
#[derive(Debug, Clone, Default)]
pub struct DepartmentLocks {
    inner: Arc<Mutex<HashMap<i32, Arc<Mutex<()>>>>>,
}

impl DepartmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every listed department until the guards are dropped.
    pub async fn acquire(&self, ids: impl IntoIterator<Item = i32>) -> Vec<OwnedMutexGuard<()>> {
        let ordered: BTreeSet<i32> = ids.into_iter().collect();

        let locks: Vec<Arc<Mutex<()>>> = {
            let mut map = self.inner.lock().await;
            ordered
                .iter()
                .map(|id| map.entry(*id).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}
