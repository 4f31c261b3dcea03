//! Correspondence table
//!
//! The process-wide map enforcing one managed transfer per live native
//! handle. Keys are raw handle addresses; values are weak references, so
//! the table never keeps a managed transfer alive and never makes a freed
//! handle look live. A single mutex serializes every wrap/unwrap/reset on
//! the owning bridge; the critical sections are a lookup or an insert,
//! nothing that blocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use common::Result;

use crate::managed::ManagedTransfer;

pub(crate) struct CorrespondenceTable {
    entries: Mutex<HashMap<usize, Weak<ManagedTransfer>>>,
}

impl CorrespondenceTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the live managed transfer for `key`, or construct and register
    /// one.
    ///
    /// The whole operation runs under the table lock, so two racing callers
    /// for the same key observe one insertion: the loser of the race finds
    /// the winner's entry instead of inserting a duplicate. `make` failures
    /// leave the table untouched: construction happens before insertion.
    /// An entry whose managed transfer has been dropped counts as absent
    /// and is replaced.
    pub fn get_or_try_insert(
        &self,
        key: usize,
        make: impl FnOnce() -> Result<Arc<ManagedTransfer>>,
    ) -> Result<Arc<ManagedTransfer>> {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let fresh = make()?;
        entries.insert(key, Arc::downgrade(&fresh));
        Ok(fresh)
    }

    /// Whether `key` still maps to exactly this managed transfer.
    pub fn is_current(&self, key: usize, transfer: &Arc<ManagedTransfer>) -> bool {
        self.lock()
            .get(&key)
            .and_then(Weak::upgrade)
            .map(|live| Arc::ptr_eq(&live, transfer))
            .unwrap_or(false)
    }

    /// Remove the entry for `key` if it maps to `transfer` (or to a dropped
    /// object). Returns whether an entry was removed.
    ///
    /// An entry that maps to a *different* live transfer is left alone: a
    /// stale object being reset must not evict its successor at a reused
    /// address.
    pub fn remove_entry_for(&self, key: usize, transfer: &Arc<ManagedTransfer>) -> bool {
        let mut entries = self.lock();
        let evict = match entries.get(&key) {
            Some(weak) => match weak.upgrade() {
                Some(live) => Arc::ptr_eq(&live, transfer),
                None => true,
            },
            None => false,
        };
        if evict {
            entries.remove(&key);
        }
        evict
    }

    /// Number of entries whose managed transfer is still alive.
    pub fn live_entries(&self) -> usize {
        self.lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, Weak<ManagedTransfer>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
