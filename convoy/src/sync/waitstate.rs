//! Futex-style wait state
//!
//! Per-address versioned wait/notify. A fixed table of slots is indexed by
//! a hash of the watched address, so unrelated addresses may share a slot;
//! that is safe because a wake is only ever a hint — waiters revalidate
//! their predicate after every wake, and never trust the wake itself.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::arch;
use crate::config::{WAITSTATE_SLOTS, WAITSTATE_SPIN_TRIES};
use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::sync::spinlock::RawSpinLock;
use crate::tick::{Deadline, Ticks};

/// One wait slot: waiter count, a guarding lock for the version counter,
/// and the version word itself, which doubles as the parking address.
pub struct WaitState {
    waiters: AtomicUsize,
    lock: RawSpinLock,
    version: AtomicU32,
}

static SLOTS: [WaitState; WAITSTATE_SLOTS] = {
    const SLOT: WaitState = WaitState::new();
    [SLOT; WAITSTATE_SLOTS]
};

impl WaitState {
    const fn new() -> Self {
        Self {
            waiters: AtomicUsize::new(0),
            lock: RawSpinLock::new(),
            version: AtomicU32::new(0),
        }
    }

    /// Slot for a watched address. Low two bits carry no entropy on aligned
    /// words, so they are shifted out before hashing.
    pub fn for_address<T>(address: *const T) -> &'static WaitState {
        let index = (address as usize >> 2) % WAITSTATE_SLOTS;
        &SLOTS[index]
    }

    fn version_snapshot(&self) -> u32 {
        // Sampled under the slot lock so a concurrent notify is either
        // fully before (new version observed) or fully after this point.
        let _ = self.lock.lock(crate::tick::WAIT_FOREVER);
        let version = self.version.load(Ordering::Relaxed);
        let _ = self.lock.unlock();
        version
    }

    /// Block until `pred()` is true or the timeout elapses.
    ///
    /// Fast path: a few direct predicate probes with yields, so an already
    /// satisfied predicate never blocks. Slow path: register as a waiter,
    /// then park on the version word — parking only happens while the
    /// version is unchanged since the last observation, so a notify between
    /// observation and parking is never missed.
    pub fn wait<F>(&self, mut pred: F, timeout: Ticks) -> SyncResult<()>
    where
        F: FnMut() -> bool,
    {
        for _ in 0..WAITSTATE_SPIN_TRIES {
            if pred() {
                return Ok(());
            }
            arch::yield_now();
        }

        self.waiters.fetch_add(1, Ordering::SeqCst);
        let deadline = Deadline::new(timeout);
        let mut previous = self.version_snapshot();

        let result = loop {
            if pred() {
                break Ok(());
            }
            if deadline.expired() {
                break Err(SyncError::Timeout);
            }
            arch::park_wait(&self.version, previous, deadline.remaining());
            previous = self.version_snapshot();
        };

        self.waiters.fetch_sub(1, Ordering::Release);
        result
    }

    /// Wake all waiters on this slot. The version is bumped only when
    /// someone is registered (the lock acquisition honours `timeout`), but
    /// the wake itself is unconditional — a false-positive wake is harmless.
    pub fn notify(&self, timeout: Ticks) -> SyncResult<()> {
        if self.waiters.load(Ordering::SeqCst) != 0 {
            self.lock.lock(timeout)?;
            self.version.fetch_add(1, Ordering::Relaxed);
            self.lock.unlock()?;
        }
        arch::park_wake_all(&self.version);
        Ok(())
    }

    /// Registered waiters on this slot (all watched addresses that alias it).
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::{NO_WAIT, WAIT_FOREVER};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_satisfied_predicate_returns_without_blocking() {
        let state = WaitState::for_address(&0u32 as *const u32);
        let start = std::time::Instant::now();
        state.wait(|| true, WAIT_FOREVER).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_millis(50));
    }

    #[test]
    fn test_unsatisfied_predicate_times_out() {
        let target = 0u32;
        let state = WaitState::for_address(&target as *const u32);
        assert_eq!(state.wait(|| false, 20), Err(SyncError::Timeout));
        assert_eq!(state.wait(|| false, NO_WAIT), Err(SyncError::Timeout));
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_addr = Arc::as_ptr(&flag);

        let waiter_flag = flag.clone();
        let waiter = std::thread::spawn(move || {
            let state = WaitState::for_address(Arc::as_ptr(&waiter_flag));
            state.wait(|| waiter_flag.load(Ordering::Acquire), WAIT_FOREVER)
        });

        arch::delay(20);
        flag.store(true, Ordering::Release);
        WaitState::for_address(flag_addr).notify(WAIT_FOREVER).unwrap();

        assert_eq!(waiter.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_aliased_addresses_share_a_slot() {
        // Addresses 16 words apart collide in a 16-slot table.
        let words = [0u32; WAITSTATE_SLOTS * 4 + 1];
        let a = WaitState::for_address(&words[0] as *const u32) as *const WaitState;
        let b = WaitState::for_address(&words[WAITSTATE_SLOTS] as *const u32) as *const WaitState;
        assert_eq!(a, b);
    }
}
