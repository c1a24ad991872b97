//! Platform collaborator surface
//!
//! The narrow interface the core consumes from the platform: native locks,
//! event groups, task spawn/notify, the tick source, and an address-keyed
//! park/wake substrate. A port supplies concrete implementations; the
//! `hosted` port (default) backs everything with `std` threads so the layer
//! runs on a development host.
//!
//! Ports must provide:
//!
//! - `LockHandle` / `lock_create(LockKind)` — simple locks are ownerless
//!   gates (a different context may give than took, which the private task
//!   wait-semaphore relies on); recursive locks track owner and depth.
//! - `EventGroupHandle` / `event_group_create()` — bitmask wait/set/clear
//!   with wait-for-any/all and optional clear-on-exit.
//! - `spawn` / `current_handle` / `yield_now` / `tick_count` / `delay` /
//!   `notify_give` / `notify_take` / `kill`.
//! - `park_wait` / `park_wake_all` — block while an atomic word holds an
//!   expected value, atomically with respect to wakes on the same address.
//! - `log_write` — sink for the logging subsystem.

#[cfg(feature = "hosted")]
mod hosted;

#[cfg(feature = "hosted")]
pub use hosted::{
    current_handle, delay, event_group_create, kill, lock_create, log_write, notify_give,
    notify_take, park_wait, park_wake_all, spawn, tick_count, yield_now, EventGroupHandle,
    LockHandle, LockKind, SpawnError, TaskHandle,
};

#[cfg(not(feature = "hosted"))]
compile_error!(
    "no platform port selected: enable the `hosted` feature or link a native port"
);
