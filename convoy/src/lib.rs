//! Convoy — portable task and synchronization layer
//!
//! Mutexes, condition variables, a futex-style wait/notify primitive,
//! semaphores, spinlocks, a one-shot latch, a lazy singleton, and a task
//! abstraction with start/join/wait/signal semantics, built on a minimal
//! preemptive scheduler supplied by the platform. The layer provides
//! blocking primitives, not scheduling policy.
//!
//! Blocking is cooperative: a suspended task resumes only via signal,
//! timeout, or forced termination. There is no asynchronous cancellation.
//!
//! # Module Structure
//!
//! - [`arch`]: the platform collaborator surface and the hosted port
//! - [`sync`]: the synchronization primitive family
//! - [`task`]: task lifecycle, registry, mailbox
//! - [`lock`]: the common lock trait and RAII guard
//! - [`tick`]: tick timeouts and deadlines
//! - [`logger`]: structured logging
//! - [`error`]: return-coded error model
//! - [`config`]: compile-time tuning constants

#![cfg_attr(not(feature = "hosted"), no_std)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod error;
pub mod lock;
pub mod logger;
pub mod sync;
pub mod task;
pub mod tick;

pub use error::{SyncError, SyncResult};
pub use lock::{LockGuard, NullLock, RawLock};
pub use sync::{
    BinarySemaphore, ConditionVariable, CountingSemaphore, EventGroup, Latch, Mutex,
    RawSpinLock, RecursiveMutex, Singleton, SpinLock, SpinLockGuard, TimedLock, WaitState,
};
pub use task::{
    mailbox::{Mailbox, MessageTask},
    Task, TaskBuilder, TaskEvents, TaskPriority, TaskState,
};
pub use tick::{Deadline, Ticks, NO_WAIT, WAIT_FOREVER};
