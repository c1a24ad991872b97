//! Latch
//!
//! One-shot countdown barrier: tasks block until the counter reaches zero.
//! Built on an atomic counter plus the wait-state table.

use core::sync::atomic::{AtomicIsize, Ordering};

use crate::error::SyncResult;
use crate::sync::waitstate::WaitState;
use crate::tick::Ticks;

/// One-shot countdown latch.
pub struct Latch {
    value: AtomicIsize,
}

impl Latch {
    pub const fn max() -> isize {
        isize::MAX
    }

    /// Latch that opens after `expected` total count-downs.
    pub const fn new(expected: isize) -> Self {
        Self {
            value: AtomicIsize::new(expected),
        }
    }

    /// Subtract `n` from the counter; the count-down that brings it to
    /// exactly zero wakes all waiters. Counting below zero is a usage
    /// error: the latch never opens for waiters once the counter goes
    /// negative. `timeout` bounds the internal notify handshake.
    pub fn count_down(&self, n: isize, timeout: Ticks) -> SyncResult<()> {
        let previous = self.value.fetch_sub(n, Ordering::Release);
        if previous == n {
            WaitState::for_address(&self.value as *const AtomicIsize).notify(timeout)?;
        }
        Ok(())
    }

    /// Non-blocking check: has the counter reached zero?
    pub fn try_wait(&self) -> bool {
        self.value.load(Ordering::Acquire) == 0
    }

    /// Block until the counter reaches zero or the timeout elapses.
    pub fn wait(&self, timeout: Ticks) -> SyncResult<()> {
        WaitState::for_address(&self.value as *const AtomicIsize).wait(|| self.try_wait(), timeout)
    }

    /// Count down by `n`, then wait for the latch to open.
    pub fn arrive_and_wait(&self, n: isize, timeout: Ticks) -> SyncResult<()> {
        self.count_down(n, timeout)?;
        self.wait(timeout)
    }
}
