//! Hosted port
//!
//! Implements the arch surface on top of `std` threads so the layer can be
//! exercised on a development host. Priorities and core affinity are
//! recorded by the caller but not enforced here — the host scheduler owns
//! placement. Forced task deletion is not available on this port.

mod event;
mod lock;
mod park;
mod task;

pub use event::{event_group_create, EventGroupHandle};
pub use lock::{lock_create, LockHandle, LockKind};
pub use park::{park_wait, park_wake_all};
pub use task::{
    current_handle, delay, kill, notify_give, notify_take, spawn, tick_count, yield_now,
    SpawnError, TaskHandle,
};

/// Logging sink: one line per call, to stderr.
pub fn log_write(args: core::fmt::Arguments) {
    use std::io::Write;
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    let _ = writeln!(out, "{}", args);
}
