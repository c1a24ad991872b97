//! Error model
//!
//! All fallible operations in this crate are return-coded: blocking calls
//! report timeouts as an expected, non-fatal outcome, distinct from hard
//! failures.

/// Errors reported by synchronization primitives and the task layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// Operation failed for an unspecified reason
    Failed,
    /// A native resource (lock, event group) was not created yet
    NotInitialized,
    /// `start()` called on a task that is already running or was already started
    AlreadyRunning,
    /// `join()`/`wait()` called on a task that was never started
    NotRunning,
    /// `join()`/`wait()` called from the task's own execution context
    SelfJoinDeadlock,
    /// The native task could not be spawned
    SpawnFailed,
    /// The timeout elapsed before the operation completed
    Timeout,
}

impl SyncError {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncError::Failed => "generic failure",
            SyncError::NotInitialized => "not initialized",
            SyncError::AlreadyRunning => "already running",
            SyncError::NotRunning => "not running",
            SyncError::SelfJoinDeadlock => "self join would deadlock",
            SyncError::SpawnFailed => "native spawn failed",
            SyncError::Timeout => "timed out",
        }
    }

    /// Timeouts are expected on blocking calls; everything else is a hard error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout)
    }
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result alias used across the crate.
pub type SyncResult<T> = Result<T, SyncError>;
