//! Lazily-constructed singleton
//!
//! Double-checked locking around an atomic pointer: the fast path is one
//! atomic load once the instance exists, construction happens exactly once
//! under the guarding lock, and the instance lives for the process lifetime.
//! Intentionally global state — the instance pointer is never reassigned.

use core::sync::atomic::{AtomicPtr, Ordering};

use alloc::boxed::Box;

use crate::arch;
use crate::lock::RawLock;
use crate::sync::spinlock::RawSpinLock;
use crate::tick::WAIT_FOREVER;

/// Process-lifetime singleton of `T`, lazily built by `init`.
pub struct Singleton<T, L: RawLock = RawSpinLock> {
    instance: AtomicPtr<T>,
    lock: L,
    init: fn() -> T,
}

// SAFETY: the instance is shared read-only after construction; the lock
// serializes the single construction.
unsafe impl<T: Send + Sync, L: RawLock + Send> Send for Singleton<T, L> {}
unsafe impl<T: Send + Sync, L: RawLock + Sync> Sync for Singleton<T, L> {}

impl<T> Singleton<T, RawSpinLock> {
    pub const fn new(init: fn() -> T) -> Self {
        Self {
            instance: AtomicPtr::new(core::ptr::null_mut()),
            lock: RawSpinLock::new(),
            init,
        }
    }
}

impl<T, L: RawLock> Singleton<T, L> {
    /// Singleton guarded by a caller-supplied lock type.
    pub fn with_lock(init: fn() -> T, lock: L) -> Self {
        Self {
            instance: AtomicPtr::new(core::ptr::null_mut()),
            lock,
            init,
        }
    }

    /// The instance, constructing it on first access. Exactly one
    /// construction happens no matter how many contexts race here.
    pub fn instance(&self) -> &T {
        let mut ptr = self.instance.load(Ordering::Acquire);
        if ptr.is_null() {
            while self.lock.lock(WAIT_FOREVER).is_err() {
                arch::yield_now();
            }
            ptr = self.instance.load(Ordering::Acquire);
            if ptr.is_null() {
                ptr = Box::into_raw(Box::new((self.init)()));
                self.instance.store(ptr, Ordering::Release);
            }
            let _ = self.lock.unlock();
        }
        // SAFETY: non-null pointers are only ever stored from Box::into_raw
        // and never reassigned or freed.
        unsafe { &*ptr }
    }

    pub fn is_initialized(&self) -> bool {
        !self.instance.load(Ordering::Acquire).is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

    struct Config {
        limit: usize,
    }

    fn build_config() -> Config {
        CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
        Config { limit: 8 }
    }

    static CONFIG: Singleton<Config> = Singleton::new(build_config);

    #[test]
    fn test_concurrent_access_constructs_once() {
        const TASKS: usize = 8;
        let mut handles = Vec::new();
        for _ in 0..TASKS {
            handles.push(std::thread::spawn(|| {
                CONFIG.instance() as *const Config as usize
            }));
        }
        let mut pointers = Vec::new();
        for h in handles {
            pointers.push(h.join().unwrap());
        }
        pointers.dedup();
        assert_eq!(pointers.len(), 1);
        assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);
        assert_eq!(CONFIG.instance().limit, 8);
        assert!(CONFIG.is_initialized());
    }

    #[test]
    fn test_with_custom_lock() {
        let lazy: Singleton<u32, RawSpinLock> = Singleton::with_lock(|| 99, RawSpinLock::new());
        assert!(!lazy.is_initialized());
        assert_eq!(*lazy.instance(), 99);
        assert!(lazy.is_initialized());
    }
}
