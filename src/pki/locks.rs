//! Per-scope mutual exclusion for store mutations.
//!
//! The blob stores give no atomicity across multiple writes, so every
//! mutating operation takes a lock scoped to the record it touches (a CA
//! name, a role path, a client name). Locks are created lazily and never
//! removed; the table only ever holds one entry per scope ever mutated.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

#[derive(Clone, Default)]
pub struct ScopeLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the lock cell for a scope, creating it on first use.
    pub fn scope(&self, key: &str) -> ScopeLock {
        let cell = self.locks.entry(key.to_string()).or_default().clone();
        ScopeLock { cell }
    }
}

pub struct ScopeLock {
    cell: Arc<Mutex<()>>,
}

impl ScopeLock {
    /// Block until the scope is exclusively held. A poisoned lock is taken
    /// over; the guarded data lives in the stores, not in the mutex.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_scope_shares_a_lock() {
        let locks = ScopeLocks::new();
        let a = locks.scope("cas/root");
        let b = locks.scope("cas/root");
        assert!(Arc::ptr_eq(&a.cell, &b.cell));
    }

    #[test]
    fn test_different_scopes_do_not_contend() {
        let locks = ScopeLocks::new();
        let a = locks.scope("cas/root");
        let _held = a.lock();

        // Must not deadlock.
        let locks2 = locks.clone();
        let handle = thread::spawn(move || {
            let b = locks2.scope("cas/other");
            let _g = b.lock();
        });
        handle.join().unwrap();
    }
}
