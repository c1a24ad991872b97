//! Condition variable
//!
//! A condition variable is really a list of tasks: tasks wait, the
//! condition variable signals. The list holds non-owning references —
//! a task's lifetime is independent of any list it waits on — and wake
//! order is strictly FIFO by enqueue time.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};

use crate::error::SyncResult;
use crate::lock::RawLock;
use crate::task::{Task, TaskInner};
use crate::tick::Ticks;

/// FIFO condition variable.
pub struct ConditionVariable {
    wait_list: spin::Mutex<VecDeque<Weak<TaskInner>>>,
}

impl ConditionVariable {
    pub const fn new() -> Self {
        Self {
            wait_list: spin::Mutex::new(VecDeque::new()),
        }
    }

    /// Block the calling task until signaled or the timeout elapses.
    ///
    /// The caller must hold `lock`; it is released while blocked and held
    /// again when this returns, regardless of the wake reason. Callers
    /// re-check their predicate in a loop — a wake is not a proof.
    pub fn wait<L: RawLock>(&self, lock: &L, timeout: Ticks) -> SyncResult<()> {
        let task = Task::current()?;
        task.inner().block_on_cv(self, lock, timeout)
    }

    /// Wake the oldest waiter; no-op when nobody waits. A popped task is
    /// off the list and cannot be woken again by a later signal.
    pub fn signal(&self) {
        loop {
            let front = self.wait_list.lock().pop_front();
            match front {
                None => break,
                Some(weak) => {
                    if let Some(task) = weak.upgrade() {
                        task.signal();
                        break;
                    }
                    // Stale entry of a dropped task; keep looking.
                }
            }
        }
    }

    /// Wake every waiter, oldest first.
    pub fn broadcast(&self) {
        loop {
            let front = self.wait_list.lock().pop_front();
            match front {
                None => break,
                Some(weak) => {
                    if let Some(task) = weak.upgrade() {
                        task.signal();
                    }
                }
            }
        }
    }

    /// Wake up one waiter.
    pub fn notify_one(&self) {
        self.signal();
    }

    /// Wake up all waiters.
    pub fn notify_all(&self) {
        self.broadcast();
    }

    /// Currently enqueued waiters.
    pub fn waiters(&self) -> usize {
        self.wait_list.lock().len()
    }

    pub(crate) fn enqueue(&self, task: Weak<TaskInner>) {
        self.wait_list.lock().push_back(task);
    }

    /// Drop `task` from the list; false when a signal already popped it.
    pub(crate) fn remove(&self, task: &Arc<TaskInner>) -> bool {
        let mut list = self.wait_list.lock();
        let before = list.len();
        list.retain(|weak| !core::ptr::eq(weak.as_ptr(), Arc::as_ptr(task)));
        list.len() != before
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}
