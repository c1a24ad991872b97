//! Synchronization Primitives
//!
//! The primitive family, leaves first:
//!
//! - `SpinLock` — busy-wait, very short critical sections
//! - `BinarySemaphore` / `CountingSemaphore` — spin-based gates
//! - `Mutex` / `RecursiveMutex` — blocking, native lock handles
//! - `EventGroup` — bitmask wait/set/clear
//! - `ConditionVariable` — FIFO wait list of tasks
//! - `TimedLock` — portable timeout lock from CV + internal lock
//! - `WaitState` — futex-style versioned wait/notify
//! - `Latch` — one-shot countdown barrier
//! - `Singleton` — lazy double-checked instance
//!
//! Each primitive guards its own state with its own internal lock only;
//! none acquires another primitive's internal lock while holding its own.

pub mod condvar;
pub mod event_group;
pub mod latch;
pub mod lazy;
pub mod mutex;
pub mod semaphore;
pub mod spinlock;
pub mod timed_lock;
pub mod waitstate;

pub use condvar::ConditionVariable;
pub use event_group::EventGroup;
pub use latch::Latch;
pub use lazy::Singleton;
pub use mutex::{Mutex, RecursiveMutex};
pub use semaphore::{BinarySemaphore, CountingSemaphore};
pub use spinlock::{RawSpinLock, SpinLock, SpinLockGuard};
pub use timed_lock::TimedLock;
pub use waitstate::WaitState;
