//! Address-keyed park/wake substrate
//!
//! Blocks a caller while an atomic word holds an expected value. The check
//! happens under the per-address slot lock, and wakers take the same lock
//! before notifying, so a wake issued after the word changes can never be
//! missed by a waiter that observed the old value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use crate::tick::{Ticks, NO_WAIT, WAIT_FOREVER};

struct ParkSlot {
    guard: Mutex<()>,
    cond: Condvar,
}

lazy_static! {
    static ref PARK_TABLE: Mutex<BTreeMap<usize, Arc<ParkSlot>>> = Mutex::new(BTreeMap::new());
}

fn slot_for(addr: usize) -> Arc<ParkSlot> {
    let mut table = match PARK_TABLE.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    table
        .entry(addr)
        .or_insert_with(|| {
            Arc::new(ParkSlot {
                guard: Mutex::new(()),
                cond: Condvar::new(),
            })
        })
        .clone()
}

fn guard_of(slot: &ParkSlot) -> MutexGuard<'_, ()> {
    match slot.guard.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Block while `word == expected`, up to `timeout` ticks. Returns true when
/// woken or when the word no longer holds the expected value; false on
/// timeout. Spurious returns are allowed — callers revalidate.
pub fn park_wait(word: &AtomicU32, expected: u32, timeout: Ticks) -> bool {
    let slot = slot_for(word as *const AtomicU32 as usize);
    let mut g = guard_of(&slot);

    if word.load(Ordering::SeqCst) != expected {
        return true;
    }
    if timeout == NO_WAIT {
        return false;
    }

    let deadline = if timeout == WAIT_FOREVER {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(timeout as u64))
    };

    while word.load(Ordering::SeqCst) == expected {
        match deadline {
            None => {
                g = match slot.cond.wait(g) {
                    Ok(x) => x,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
            Some(at) => {
                let now = Instant::now();
                if now >= at {
                    return false;
                }
                let (x, _res) = match slot.cond.wait_timeout(g, at - now) {
                    Ok(pair) => pair,
                    Err(poisoned) => poisoned.into_inner(),
                };
                g = x;
            }
        }
    }
    true
}

/// Wake every parker on `word`. The slot lock is taken so a concurrent
/// parker is either already waiting (and gets the notification) or has not
/// yet re-checked the word (and will observe the new value).
pub fn park_wake_all(word: &AtomicU32) {
    let slot = slot_for(word as *const AtomicU32 as usize);
    let _g = guard_of(&slot);
    slot.cond.notify_all();
}
