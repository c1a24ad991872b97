//! Timed lock
//!
//! A blocking lock with timeout support built portably from a condition
//! variable and an internal short-section lock, independent of native
//! timeout capabilities.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::sync::condvar::ConditionVariable;
use crate::sync::spinlock::RawSpinLock;
use crate::tick::{Deadline, Ticks, WAIT_FOREVER};

/// Portable blocking lock: a `locked` flag guarded by `L`, with blocked
/// lockers parked on a condition variable.
pub struct TimedLock<L: RawLock = RawSpinLock> {
    cv: ConditionVariable,
    guard: L,
    locked: AtomicBool,
}

impl TimedLock<RawSpinLock> {
    pub const fn new() -> Self {
        Self {
            cv: ConditionVariable::new(),
            guard: RawSpinLock::new(),
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for TimedLock<RawSpinLock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RawLock> TimedLock<L> {
    /// Compose with a caller-supplied internal lock.
    pub fn with_lock(guard: L) -> Self {
        Self {
            cv: ConditionVariable::new(),
            guard,
            locked: AtomicBool::new(false),
        }
    }

    fn lock_inner(&self, timeout: Ticks) -> SyncResult<()> {
        let deadline = Deadline::new(timeout);
        self.guard.lock(WAIT_FOREVER)?;

        // Loop, don't just wait once: a broadcast wakes every parked
        // locker, and only the first to re-observe the flag clear may
        // proceed — the rest must go back to waiting.
        while self.locked.load(Ordering::Relaxed) {
            if deadline.expired() {
                let _ = self.guard.unlock();
                return Err(SyncError::Timeout);
            }
            match self.cv.wait(&self.guard, deadline.remaining()) {
                Ok(()) | Err(SyncError::Timeout) => {}
                Err(other) => {
                    let _ = self.guard.unlock();
                    return Err(other);
                }
            }
        }
        self.locked.store(true, Ordering::Relaxed);
        self.guard.unlock()
    }

    /// Release the lock. `signal_children` chooses between waking all
    /// parked lockers (broadcast) or only the oldest one.
    pub fn unlock_with(&self, signal_children: bool) -> SyncResult<()> {
        self.guard.lock(WAIT_FOREVER)?;
        self.locked.store(false, Ordering::Relaxed);
        if signal_children {
            self.cv.broadcast();
        } else {
            self.cv.signal();
        }
        self.guard.unlock()
    }
}

impl<L: RawLock> RawLock for TimedLock<L> {
    fn lock(&self, timeout: Ticks) -> SyncResult<()> {
        self.lock_inner(timeout)
    }

    fn unlock(&self) -> SyncResult<()> {
        self.unlock_with(true)
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::NO_WAIT;
    use std::sync::Arc;

    #[test]
    fn test_lock_unlock() {
        let tl = TimedLock::new();
        tl.lock(WAIT_FOREVER).unwrap();
        assert!(tl.is_locked());
        tl.unlock().unwrap();
        assert!(!tl.is_locked());
    }

    #[test]
    fn test_contended_lock_blocks_until_release() {
        let tl = Arc::new(TimedLock::new());
        tl.lock(WAIT_FOREVER).unwrap();

        let contender = tl.clone();
        let blocked = std::thread::spawn(move || {
            let begin = crate::arch::tick_count();
            contender.lock(WAIT_FOREVER).unwrap();
            let waited = crate::arch::tick_count().wrapping_sub(begin);
            contender.unlock().unwrap();
            waited
        });

        crate::arch::delay(50);
        tl.unlock().unwrap();
        let waited = blocked.join().unwrap();
        assert!(waited >= 40, "contender waited only {} ticks", waited);
    }

    #[test]
    fn test_lock_times_out() {
        let tl = Arc::new(TimedLock::new());
        tl.lock(WAIT_FOREVER).unwrap();
        let contender = tl.clone();
        let result = std::thread::spawn(move || contender.lock(30)).join().unwrap();
        assert_eq!(result, Err(SyncError::Timeout));
        tl.unlock().unwrap();
    }

    #[test]
    fn test_try_lock_flag() {
        let tl = TimedLock::new();
        assert!(tl.try_lock());
        assert!(tl.is_locked());
        assert_eq!(tl.lock(NO_WAIT), Err(SyncError::Timeout));
        tl.unlock().unwrap();
    }

    #[test]
    fn test_no_torn_updates_under_contention() {
        const TASKS: usize = 4;
        const ROUNDS: usize = 50;

        let tl = Arc::new(TimedLock::new());
        let counter = Arc::new(spin::Mutex::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let tl = tl.clone();
            let counter = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..ROUNDS {
                    tl.lock(WAIT_FOREVER).unwrap();
                    // Read-modify-write inside the critical section.
                    let current = *counter.lock();
                    std::thread::yield_now();
                    *counter.lock() = current + 1;
                    tl.unlock().unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock(), (TASKS * ROUNDS) as u64);
    }
}
