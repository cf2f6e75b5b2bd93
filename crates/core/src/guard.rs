//! In-flight claims and keyed async locks.
//!
//! [`ClaimSet`] rejects a second concurrent mutation of the same entity
//! outright. [`KeyedLocks`] serialises work per key and bounds the wait with
//! a timeout. [`LedgerLocks`] is the set shared by posting, the chart and the
//! calendar: a period lock is always taken before any account lock.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, OwnedMutexGuard};
use fundbook_shared::types::{AccountId, FiscalPeriodId};

/// Set of keys currently being mutated.
#[derive(Debug)]
pub struct ClaimSet<K: Eq + Hash> {
    inner: Arc<DashMap<K, ()>>,
}

impl<K: Eq + Hash> Default for ClaimSet<K> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> ClaimSet<K> {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, or returns `None` if another caller holds it.
    ///
    /// The claim is released when the returned guard is dropped.
    pub fn claim(&self, key: K) -> Option<Claim<K>> {
        match self.inner.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Claim {
                    set: Arc::clone(&self.inner),
                    key,
                })
            }
        }
    }

    #[cfg(test)]
    fn is_claimed(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }
}

/// RAII claim on one key of a [`ClaimSet`].
#[derive(Debug)]
pub struct Claim<K: Eq + Hash> {
    set: Arc<DashMap<K, ()>>,
    key: K,
}

impl<K: Eq + Hash> Drop for Claim<K> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Lock acquisition did not finish within the configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {0:?} waiting for a lock")]
pub struct LockTimeout(pub Duration);

type Registry<K> = DashMap<K, Arc<Mutex<()>>>;

/// Registry of per-key async mutexes.
///
/// Clones share the registry. An entry is dropped again once nobody holds or
/// waits on it.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<Registry<K>>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

/// Guards returned by [`KeyedLocks::acquire_all`]; dropping releases every key.
#[derive(Debug)]
pub struct LockSet<K: Eq + Hash> {
    registry: Arc<Registry<K>>,
    held: Vec<(K, OwnedMutexGuard<()>)>,
}

impl<K: Eq + Hash> LockSet<K> {
    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl<K: Eq + Hash> Drop for LockSet<K> {
    fn drop(&mut self) {
        let keys: Vec<K> = self
            .held
            .drain(..)
            .map(|(key, guard)| {
                drop(guard);
                key
            })
            .collect();
        prune(&self.registry, &keys);
    }
}

// the shard lock taken by `remove_if` also guards `mutex_for`, so a count of
// one means no holder and no waiter
fn prune<K: Eq + Hash>(registry: &Registry<K>, keys: &[K]) {
    for key in keys {
        registry.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K: Eq + Hash + Ord + Clone> KeyedLocks<K> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, key: &K) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Acquires every key in ascending order.
    ///
    /// Keys are de-duplicated. Sorted acquisition keeps two callers with
    /// overlapping key sets from deadlocking each other.
    ///
    /// # Errors
    ///
    /// Returns [`LockTimeout`] if the whole set is not held within `timeout`.
    /// Any keys already acquired are released.
    pub async fn acquire_all<I>(&self, keys: I, timeout: Duration) -> Result<LockSet<K>, LockTimeout>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<_> = keys.iter().map(|key| self.mutex_for(key)).collect();
        let acquire = async move {
            let mut guards = Vec::with_capacity(mutexes.len());
            for mutex in mutexes {
                guards.push(mutex.lock_owned().await);
            }
            guards
        };

        let acquired = tokio::time::timeout(timeout, acquire).await;
        match acquired {
            Ok(guards) => Ok(LockSet {
                registry: Arc::clone(&self.locks),
                held: keys.into_iter().zip(guards).collect(),
            }),
            Err(_) => {
                prune(&self.locks, &keys);
                Err(LockTimeout(timeout))
            }
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.locks.len()
    }
}

/// Locks shared by every service that reads or changes what a posting
/// depends on.
#[derive(Debug, Clone)]
pub struct LedgerLocks {
    accounts: KeyedLocks<AccountId>,
    periods: KeyedLocks<FiscalPeriodId>,
    timeout: Duration,
}

impl LedgerLocks {
    /// Creates empty registries that give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            accounts: KeyedLocks::new(),
            periods: KeyedLocks::new(),
            timeout,
        }
    }

    /// Locks every account in `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`LockTimeout`] if the set is not held in time.
    pub async fn accounts<I>(&self, ids: I) -> Result<LockSet<AccountId>, LockTimeout>
    where
        I: IntoIterator<Item = AccountId>,
    {
        self.accounts.acquire_all(ids, self.timeout).await
    }

    /// Locks one fiscal period. Take it before any account lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockTimeout`] if the period is not held in time.
    pub async fn period(&self, id: FiscalPeriodId) -> Result<LockSet<FiscalPeriodId>, LockTimeout> {
        self.periods.acquire_all([id], self.timeout).await
    }
}
