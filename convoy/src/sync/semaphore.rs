//! Semaphores
//!
//! `BinarySemaphore` is a spin-based mutual-exclusion gate with yield
//! backoff. `CountingSemaphore<MAX>` admits up to `MAX` concurrent holders
//! behind one shared binary gate.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::arch;
use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::tick::{Deadline, Ticks};

/// Spin-based binary semaphore. No native blocking: contended lockers
/// yield between retries.
pub struct BinarySemaphore {
    flag: AtomicBool,
}

impl BinarySemaphore {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl RawLock for BinarySemaphore {
    fn lock(&self, _timeout: Ticks) -> SyncResult<()> {
        loop {
            if !self.flag.swap(true, Ordering::Acquire) {
                return Ok(());
            }
            while self.flag.load(Ordering::Relaxed) {
                arch::yield_now();
            }
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        self.flag.store(false, Ordering::Release);
        Ok(())
    }

    fn try_lock(&self) -> bool {
        !self.flag.load(Ordering::Relaxed) && !self.flag.swap(true, Ordering::Acquire)
    }

    fn is_locked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Counting semaphore: at most `MAX` holders between `lock` and `unlock`.
///
/// A holder slot is reserved with a CAS retry loop *before* any gating, so
/// the count can never race past `MAX`. Only the 0→1 holder transition
/// acquires the shared gate and only the 1→0 transition releases it.
pub struct CountingSemaphore<const MAX: usize> {
    gate: BinarySemaphore,
    count: AtomicUsize,
}

impl<const MAX: usize> CountingSemaphore<MAX> {
    pub const fn new() -> Self {
        Self {
            gate: BinarySemaphore::new(),
            count: AtomicUsize::new(0),
        }
    }

    pub const fn max_count(&self) -> usize {
        MAX
    }

    /// Current number of holders.
    pub fn get_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Remaining free slots; `get_count() + get_left() == MAX`.
    pub fn get_left(&self) -> usize {
        MAX - self.get_count()
    }

    /// Reserve a slot, waiting for one to free up until the deadline.
    fn reserve(&self, deadline: &Deadline) -> SyncResult<usize> {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= MAX {
                if deadline.expired() {
                    return Err(SyncError::Timeout);
                }
                arch::yield_now();
                continue;
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(current);
            }
        }
    }
}

impl<const MAX: usize> Default for CountingSemaphore<MAX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX: usize> RawLock for CountingSemaphore<MAX> {
    fn lock(&self, timeout: Ticks) -> SyncResult<()> {
        let deadline = Deadline::new(timeout);
        let previous = self.reserve(&deadline)?;
        if previous == 0 {
            // First holder of this epoch takes the gate; the gate is
            // spin-based, so this cannot fail, only briefly overlap with
            // the previous epoch's release.
            self.gate.lock(deadline.remaining())?;
        }
        Ok(())
    }

    fn unlock(&self) -> SyncResult<()> {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            self.gate.unlock()?;
        }
        Ok(())
    }

    fn try_lock(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= MAX {
                return false;
            }
            if self
                .count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }
            if current == 0 && !self.gate.try_lock() {
                // Previous epoch still releasing; back out the reservation.
                self.count.fetch_sub(1, Ordering::AcqRel);
                return false;
            }
            return true;
        }
    }

    fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }
}
