//! Native event groups for the hosted port
//!
//! A 32-bit mask guarded by a mutex; setters wake every waiter, each waiter
//! re-evaluates its own wait condition.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::tick::{Ticks, NO_WAIT, WAIT_FOREVER};

struct EventInner {
    bits: Mutex<u32>,
    cond: Condvar,
}

/// Handle to a native event group. Cloning shares the same group; the group
/// is released when the last handle drops.
#[derive(Clone)]
pub struct EventGroupHandle {
    inner: Arc<EventInner>,
}

fn bits_of(inner: &EventInner) -> MutexGuard<'_, u32> {
    match inner.bits.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn satisfied(bits: u32, mask: u32, wait_for_all: bool) -> bool {
    if wait_for_all {
        bits & mask == mask
    } else {
        bits & mask != 0
    }
}

pub fn event_group_create() -> Option<EventGroupHandle> {
    Some(EventGroupHandle {
        inner: Arc::new(EventInner {
            bits: Mutex::new(0),
            cond: Condvar::new(),
        }),
    })
}

impl EventGroupHandle {
    /// Set bits and wake all waiters. Returns the resulting mask.
    pub fn set(&self, mask: u32) -> u32 {
        let mut bits = bits_of(&self.inner);
        *bits |= mask;
        let now = *bits;
        drop(bits);
        self.inner.cond.notify_all();
        now
    }

    /// Clear bits. Returns the mask before clearing.
    pub fn clear(&self, mask: u32) -> u32 {
        let mut bits = bits_of(&self.inner);
        let before = *bits;
        *bits &= !mask;
        before
    }

    pub fn get(&self) -> u32 {
        *bits_of(&self.inner)
    }

    /// Wait until the mask condition holds or the timeout elapses. Returns
    /// the bits observed on exit; the caller decides whether the condition
    /// was met. When met and `clear_on_exit` is set, the mask bits are
    /// cleared before returning.
    pub fn wait(&self, mask: u32, clear_on_exit: bool, wait_for_all: bool, timeout: Ticks) -> u32 {
        let deadline = if timeout == WAIT_FOREVER {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(timeout as u64))
        };

        let mut bits = bits_of(&self.inner);
        loop {
            if satisfied(*bits, mask, wait_for_all) {
                let observed = *bits;
                if clear_on_exit {
                    *bits &= !mask;
                }
                return observed;
            }
            if timeout == NO_WAIT {
                return *bits;
            }
            match deadline {
                None => {
                    bits = match self.inner.cond.wait(bits) {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        return *bits;
                    }
                    let (g, _res) = match self.inner.cond.wait_timeout(bits, at - now) {
                        Ok(pair) => pair,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    bits = g;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let eg = event_group_create().unwrap();
        assert_eq!(eg.get(), 0);
        assert_eq!(eg.set(0b101), 0b101);
        assert_eq!(eg.get(), 0b101);
    }

    #[test]
    fn test_clear_returns_previous() {
        let eg = event_group_create().unwrap();
        eg.set(0b11);
        assert_eq!(eg.clear(0b01), 0b11);
        assert_eq!(eg.get(), 0b10);
    }

    #[test]
    fn test_wait_any_vs_all() {
        let eg = event_group_create().unwrap();
        eg.set(0b01);
        assert_eq!(eg.wait(0b11, false, false, NO_WAIT) & 0b11, 0b01);
        // wait-for-all is not satisfied by a single bit
        let got = eg.wait(0b11, false, true, NO_WAIT);
        assert_ne!(got & 0b11, 0b11);
    }

    #[test]
    fn test_clear_on_exit() {
        let eg = event_group_create().unwrap();
        eg.set(0b1);
        let got = eg.wait(0b1, true, false, NO_WAIT);
        assert_eq!(got & 0b1, 0b1);
        assert_eq!(eg.get(), 0);
    }

    #[test]
    fn test_cross_thread_wake() {
        let eg = event_group_create().unwrap();
        let eg2 = eg.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            eg2.set(0b100);
        });
        let got = eg.wait(0b100, false, false, WAIT_FOREVER);
        assert_eq!(got & 0b100, 0b100);
        t.join().unwrap();
    }
}
