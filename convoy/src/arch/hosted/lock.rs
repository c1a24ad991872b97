//! Native lock handles for the hosted port
//!
//! Simple locks are ownerless binary gates: any context may give a taken
//! lock, which the task layer's private wait-semaphore protocol requires.
//! Recursive locks track an owner and a depth and may only be given by the
//! owning context.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::task::current_handle;
use crate::tick::{Ticks, NO_WAIT, WAIT_FOREVER};

/// Kind of native lock to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Simple,
    Recursive,
}

#[derive(Default)]
struct LockState {
    locked: bool,
    owner: u64,
    depth: u32,
}

struct LockInner {
    kind: LockKind,
    state: Mutex<LockState>,
    cond: Condvar,
}

/// Owned handle to a native lock; the backing object is released when the
/// last handle drops, so a handle can never outlive its lock.
pub struct LockHandle {
    inner: Arc<LockInner>,
}

/// Ignore lock poisoning: a panicking test thread must not wedge every
/// other test that shares a global table.
fn state_of(inner: &LockInner) -> MutexGuard<'_, LockState> {
    match inner.state.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn lock_create(kind: LockKind) -> Option<LockHandle> {
    Some(LockHandle {
        inner: Arc::new(LockInner {
            kind,
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
        }),
    })
}

impl LockHandle {
    /// Take the lock, waiting up to `timeout` ticks. Returns false on
    /// timeout (or immediately, for `NO_WAIT`, when the lock is held).
    pub fn take(&self, timeout: Ticks) -> bool {
        let me = current_handle().id;
        let mut st = state_of(&self.inner);

        if self.inner.kind == LockKind::Recursive && st.locked && st.owner == me {
            st.depth += 1;
            return true;
        }

        let deadline = if timeout == WAIT_FOREVER {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(timeout as u64))
        };

        while st.locked {
            if timeout == NO_WAIT {
                return false;
            }
            match deadline {
                None => {
                    st = match self.inner.cond.wait(st) {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        return false;
                    }
                    let (g, _res) = match self.inner.cond.wait_timeout(st, at - now) {
                        Ok(pair) => pair,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    st = g;
                }
            }
        }

        st.locked = true;
        st.owner = me;
        st.depth = 1;
        true
    }

    /// Give the lock back. Returns false if the lock was not taken, or (for
    /// recursive locks) when the caller is not the owner.
    pub fn give(&self) -> bool {
        let me = current_handle().id;
        let mut st = state_of(&self.inner);

        if !st.locked {
            return false;
        }
        if self.inner.kind == LockKind::Recursive {
            if st.owner != me {
                return false;
            }
            st.depth -= 1;
            if st.depth > 0 {
                return true;
            }
        }

        st.locked = false;
        st.owner = 0;
        st.depth = 0;
        drop(st);
        self.inner.cond.notify_one();
        true
    }

    pub fn is_locked(&self) -> bool {
        state_of(&self.inner).locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_take_give() {
        let l = lock_create(LockKind::Simple).unwrap();
        assert!(l.take(NO_WAIT));
        assert!(l.is_locked());
        assert!(!l.take(NO_WAIT));
        assert!(l.give());
        assert!(!l.is_locked());
    }

    #[test]
    fn test_give_untaken_fails() {
        let l = lock_create(LockKind::Simple).unwrap();
        assert!(!l.give());
    }

    #[test]
    fn test_recursive_reentry() {
        let l = lock_create(LockKind::Recursive).unwrap();
        assert!(l.take(NO_WAIT));
        assert!(l.take(NO_WAIT));
        assert!(l.give());
        assert!(l.is_locked());
        assert!(l.give());
        assert!(!l.is_locked());
    }

    #[test]
    fn test_take_times_out() {
        let l = lock_create(LockKind::Simple).unwrap();
        assert!(l.take(NO_WAIT));
        let start = Instant::now();
        assert!(!l.take(30));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
