//! Event group
//!
//! Bitmask synchronization: tasks block until a set of bits is set by
//! another context, waiting for any or all of them, optionally clearing
//! the bits on exit.

use crate::arch::{self, EventGroupHandle};
use crate::error::{SyncError, SyncResult};
use crate::tick::Ticks;

/// Safe wrapper over the native event group. Clones share the group.
#[derive(Clone)]
pub struct EventGroup {
    handle: EventGroupHandle,
}

impl EventGroup {
    pub fn new() -> SyncResult<Self> {
        match arch::event_group_create() {
            Some(handle) => Ok(Self { handle }),
            None => Err(SyncError::NotInitialized),
        }
    }

    /// Set bits, waking all waiters. Returns the resulting mask.
    pub fn set(&self, bits: u32) -> u32 {
        self.handle.set(bits)
    }

    /// Clear bits. Returns the mask prior to clearing.
    pub fn clear(&self, bits: u32) -> u32 {
        self.handle.clear(bits)
    }

    /// Current mask.
    pub fn get(&self) -> u32 {
        self.handle.get()
    }

    /// Block until `bits` are set (any or all of them), up to `timeout`.
    /// Returns the observed mask on success, `Timeout` when the condition
    /// was still unmet at the deadline.
    pub fn wait(
        &self,
        bits: u32,
        clear_on_exit: bool,
        wait_for_all: bool,
        timeout: Ticks,
    ) -> SyncResult<u32> {
        let observed = self.handle.wait(bits, clear_on_exit, wait_for_all, timeout);
        let met = if wait_for_all {
            observed & bits == bits
        } else {
            observed & bits != 0
        };
        if met {
            Ok(observed)
        } else {
            Err(SyncError::Timeout)
        }
    }

    /// Convenience: block until all of `bits` are set, without clearing.
    pub fn is_set(&self, bits: u32, timeout: Ticks) -> bool {
        self.wait(bits, false, true, timeout).is_ok()
    }
}
