//! Native task operations for the hosted port
//!
//! Tasks map to `std` threads. Handles are numeric ids from a global
//! counter; the spawned thread records its id in a thread-local so
//! `current_handle` works from any context, including threads this crate
//! did not spawn (they are assigned an id on first query).

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use crate::tick::{Ticks, NO_WAIT, WAIT_FOREVER};

/// Opaque handle to a native task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub(crate) id: u64,
}

/// Native spawn failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnError;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Per-task direct-notification slot (counting, like a native task notify).
struct NotifySlot {
    count: Mutex<u32>,
    cond: Condvar,
}

lazy_static! {
    static ref NOTIFY_SLOTS: Mutex<BTreeMap<u64, Arc<NotifySlot>>> = Mutex::new(BTreeMap::new());
    static ref EPOCH: Instant = Instant::now();
}

fn slots() -> MutexGuard<'static, BTreeMap<u64, Arc<NotifySlot>>> {
    match NOTIFY_SLOTS.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn slot_for(id: u64) -> Arc<NotifySlot> {
    slots()
        .entry(id)
        .or_insert_with(|| {
            Arc::new(NotifySlot {
                count: Mutex::new(0),
                cond: Condvar::new(),
            })
        })
        .clone()
}

/// Spawn a native task. The name and stack-size hint map directly onto the
/// host thread; priority and affinity are accepted for port parity but the
/// host scheduler owns placement.
pub fn spawn(
    entry: Box<dyn FnOnce() + Send + 'static>,
    name: &str,
    stack_size: usize,
    _priority: u8,
    _affinity_core: i32,
) -> Result<TaskHandle, SpawnError> {
    let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst);
    let _ = slot_for(id);

    let mut builder = std::thread::Builder::new().name(name.to_string());
    if stack_size > 0 {
        builder = builder.stack_size(stack_size);
    }

    let spawned = builder.spawn(move || {
        CURRENT_ID.with(|c| c.set(id));
        entry();
    });

    match spawned {
        // The join handle is dropped on purpose: lifecycle completion is
        // observed through the task layer's event bits, not thread join.
        Ok(_detached) => Ok(TaskHandle { id }),
        Err(_) => Err(SpawnError),
    }
}

/// Handle of the calling context.
pub fn current_handle() -> TaskHandle {
    let id = CURRENT_ID.with(|c| {
        if c.get() == 0 {
            let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst);
            c.set(id);
        }
        c.get()
    });
    TaskHandle { id }
}

/// Forcibly delete a native task. Not supported on the hosted port: a host
/// thread cannot be terminated from outside, so this always reports false
/// and the caller degrades to bookkeeping-only termination.
pub fn kill(_handle: &TaskHandle) -> bool {
    false
}

pub fn yield_now() {
    std::thread::yield_now();
}

pub fn delay(ticks: Ticks) {
    std::thread::sleep(Duration::from_millis(ticks as u64));
}

/// Milliseconds since the first tick query, wrapping.
pub fn tick_count() -> Ticks {
    EPOCH.elapsed().as_millis() as Ticks
}

/// Increment the target task's notification count and wake it.
pub fn notify_give(handle: &TaskHandle) {
    let slot = slot_for(handle.id);
    let mut count = match slot.count.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *count = count.saturating_add(1);
    drop(count);
    slot.cond.notify_all();
}

/// Consume the calling task's notification count: wait up to `timeout` for
/// it to become nonzero, then either zero it (`clear`) or decrement it.
/// Returns the count observed before consuming (zero on timeout).
pub fn notify_take(clear: bool, timeout: Ticks) -> u32 {
    let slot = slot_for(current_handle().id);
    let deadline = if timeout == WAIT_FOREVER {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(timeout as u64))
    };

    let mut count = match slot.count.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    loop {
        if *count > 0 {
            let observed = *count;
            if clear {
                *count = 0;
            } else {
                *count -= 1;
            }
            return observed;
        }
        if timeout == NO_WAIT {
            return 0;
        }
        match deadline {
            None => {
                count = match slot.cond.wait(count) {
                    Ok(g) => g,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
            Some(at) => {
                let now = Instant::now();
                if now >= at {
                    return 0;
                }
                let (g, _res) = match slot.cond.wait_timeout(count, at - now) {
                    Ok(pair) => pair,
                    Err(poisoned) => poisoned.into_inner(),
                };
                count = g;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_handle_is_stable() {
        let a = current_handle();
        let b = current_handle();
        assert_eq!(a, b);
        assert_ne!(a.id, 0);
    }

    #[test]
    fn test_spawn_runs_entry() {
        let flag = Arc::new(AtomicU64::new(0));
        let f = flag.clone();
        let h = spawn(Box::new(move || f.store(7, Ordering::SeqCst)), "t", 0, 0, -1).unwrap();
        assert_ne!(h.id, 0);
        while flag.load(Ordering::SeqCst) == 0 {
            yield_now();
        }
        assert_eq!(flag.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_notify_give_take() {
        let me = current_handle();
        notify_give(&me);
        notify_give(&me);
        assert_eq!(notify_take(false, NO_WAIT), 2);
        assert_eq!(notify_take(false, NO_WAIT), 1);
        assert_eq!(notify_take(true, NO_WAIT), 0);
    }

    #[test]
    fn test_tick_count_advances() {
        let a = tick_count();
        delay(5);
        assert!(tick_count() >= a + 4);
    }
}
