//! Native mutexes
//!
//! Thin wrappers around the platform's lock handles. The handle is owned by
//! the wrapper and released on drop, so it cannot be reused or destroyed
//! while another context still references the wrapper.

use crate::arch::{self, LockHandle, LockKind};
use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::tick::Ticks;

/// Blocking mutex backed by a native simple lock.
pub struct Mutex {
    handle: LockHandle,
}

impl Mutex {
    /// Create the native lock; fails when the platform is out of lock
    /// resources.
    pub fn new() -> SyncResult<Self> {
        match arch::lock_create(LockKind::Simple) {
            Some(handle) => Ok(Self { handle }),
            None => Err(SyncError::NotInitialized),
        }
    }
}

impl RawLock for Mutex {
    fn lock(&self, timeout: Ticks) -> SyncResult<()> {
        if self.handle.take(timeout) {
            Ok(())
        } else {
            Err(SyncError::Timeout)
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        if self.handle.give() {
            Ok(())
        } else {
            Err(SyncError::Failed)
        }
    }

    fn is_locked(&self) -> bool {
        self.handle.is_locked()
    }
}

/// Mutex that may be re-locked by the owning context; each lock needs a
/// matching unlock.
pub struct RecursiveMutex {
    handle: LockHandle,
}

impl RecursiveMutex {
    pub fn new() -> SyncResult<Self> {
        match arch::lock_create(LockKind::Recursive) {
            Some(handle) => Ok(Self { handle }),
            None => Err(SyncError::NotInitialized),
        }
    }
}

impl RawLock for RecursiveMutex {
    fn lock(&self, timeout: Ticks) -> SyncResult<()> {
        if self.handle.take(timeout) {
            Ok(())
        } else {
            Err(SyncError::Timeout)
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        if self.handle.give() {
            Ok(())
        } else {
            Err(SyncError::Failed)
        }
    }

    fn is_locked(&self) -> bool {
        self.handle.is_locked()
    }
}
