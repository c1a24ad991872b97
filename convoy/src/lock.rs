//! Lock interface
//!
//! One trait covers every lock variant in the crate — native mutexes,
//! spinlocks, semaphores, timed locks — so they compose generically.
//! Dynamic dispatch (`&dyn RawLock`) remains available for heterogeneous
//! storage, but composition sites use generics where the concrete type is
//! known.

use crate::error::SyncResult;
use crate::tick::{Ticks, NO_WAIT};

/// Common interface of all lock variants.
pub trait RawLock {
    /// Acquire the lock, waiting up to `timeout` ticks.
    fn lock(&self, timeout: Ticks) -> SyncResult<()>;

    /// Release the lock.
    fn unlock(&self) -> SyncResult<()>;

    /// Acquire without blocking.
    fn try_lock(&self) -> bool {
        self.lock(NO_WAIT).is_ok()
    }

    /// Whether the lock is currently held.
    fn is_locked(&self) -> bool;
}

/// RAII guard: acquires on construction, releases on drop.
pub struct LockGuard<'a, L: RawLock> {
    lock: &'a L,
}

impl<'a, L: RawLock> LockGuard<'a, L> {
    pub fn new(lock: &'a L, timeout: Ticks) -> SyncResult<Self> {
        lock.lock(timeout)?;
        Ok(Self { lock })
    }
}

impl<L: RawLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

/// No-op lock for single-threaded composition.
pub struct NullLock;

impl NullLock {
    pub const fn new() -> Self {
        NullLock
    }
}

impl Default for NullLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawLock for NullLock {
    fn lock(&self, _timeout: Ticks) -> SyncResult<()> {
        Ok(())
    }

    fn unlock(&self) -> SyncResult<()> {
        Ok(())
    }

    fn is_locked(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::spinlock::RawSpinLock;
    use crate::tick::WAIT_FOREVER;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = RawSpinLock::new();
        {
            let _g = LockGuard::new(&lock, WAIT_FOREVER).unwrap();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_null_lock_is_permissive() {
        let lock = NullLock::new();
        assert!(lock.lock(NO_WAIT).is_ok());
        assert!(lock.lock(NO_WAIT).is_ok());
        assert!(!lock.is_locked());
        assert!(lock.unlock().is_ok());
    }
}
