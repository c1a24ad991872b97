//! Mailbox and message-pump task
//!
//! A mailbox pairs a mutex-guarded queue with a condition variable so a
//! receiver can block until mail arrives. `MessageTask` runs a handler
//! over a mailbox in its own task.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::sync::condvar::ConditionVariable;
use crate::sync::mutex::Mutex;
use crate::task::{Task, TaskBuilder, TaskPriority};
use crate::tick::{Deadline, Ticks, WAIT_FOREVER};

/// Blocking multi-producer mailbox.
pub struct Mailbox<M> {
    lock: Mutex,
    cv: ConditionVariable,
    queue: spin::Mutex<VecDeque<M>>,
}

impl<M> Mailbox<M> {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            lock: Mutex::new()?,
            cv: ConditionVariable::new(),
            queue: spin::Mutex::new(VecDeque::new()),
        })
    }

    /// Deliver a message and wake one blocked receiver.
    pub fn post(&self, msg: M) -> SyncResult<()> {
        self.lock.lock(WAIT_FOREVER)?;
        self.queue.lock().push_back(msg);
        self.cv.signal();
        self.lock.unlock()
    }

    /// Take the oldest message, blocking up to `timeout` for one to arrive.
    pub fn recv(&self, timeout: Ticks) -> SyncResult<M> {
        let deadline = Deadline::new(timeout);
        self.lock.lock(WAIT_FOREVER)?;
        loop {
            if let Some(msg) = self.queue.lock().pop_front() {
                self.lock.unlock()?;
                return Ok(msg);
            }
            if deadline.expired() {
                self.lock.unlock()?;
                return Err(SyncError::Timeout);
            }
            match self.cv.wait(&self.lock, deadline.remaining()) {
                Ok(()) | Err(SyncError::Timeout) => {}
                Err(other) => {
                    let _ = self.lock.unlock();
                    return Err(other);
                }
            }
        }
    }

    /// Take the oldest message if one is already queued.
    pub fn try_recv(&self) -> Option<M> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

enum Envelope<M> {
    Message(M),
    Shutdown,
}

/// A task draining a mailbox through a handler. The handler returns false
/// to stop the pump; `stop` posts a shutdown marker instead.
pub struct MessageTask<M: Send + 'static> {
    task: Task,
    mailbox: Arc<Mailbox<Envelope<M>>>,
}

impl<M: Send + 'static> MessageTask<M> {
    pub fn new<F>(
        name: &str,
        priority: TaskPriority,
        stack_size: usize,
        mut handler: F,
    ) -> SyncResult<Self>
    where
        F: FnMut(M) -> bool + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new()?);
        let pump = mailbox.clone();

        let task = TaskBuilder::new(name)
            .priority(priority)
            .stack_size(stack_size)
            .build(move || {
                loop {
                    match pump.recv(WAIT_FOREVER) {
                        Ok(Envelope::Message(msg)) => {
                            if !handler(msg) {
                                break;
                            }
                        }
                        Ok(Envelope::Shutdown) | Err(_) => break,
                    }
                }
                0
            })?;

        Ok(Self { task, mailbox })
    }

    pub fn start(&self, affinity_core: i32) -> SyncResult<()> {
        self.task.start(affinity_core)
    }

    /// Queue a message for the handler.
    pub fn post(&self, msg: M) -> SyncResult<()> {
        self.mailbox.post(Envelope::Message(msg))
    }

    /// Messages not yet handled.
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    /// Ask the pump to finish queued work and exit, then join it.
    pub fn stop(&self, timeout: Ticks) -> SyncResult<()> {
        self.mailbox.post(Envelope::Shutdown)?;
        self.task.join(timeout)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_then_recv() {
        let mailbox = Mailbox::new().unwrap();
        mailbox.post(1).unwrap();
        mailbox.post(2).unwrap();
        assert_eq!(mailbox.len(), 2);
        assert_eq!(mailbox.recv(WAIT_FOREVER).unwrap(), 1);
        assert_eq!(mailbox.try_recv(), Some(2));
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_recv_times_out_when_empty() {
        let mailbox: Mailbox<u32> = Mailbox::new().unwrap();
        assert_eq!(mailbox.recv(20), Err(SyncError::Timeout));
    }

    #[test]
    fn test_recv_blocks_until_post() {
        let mailbox = Arc::new(Mailbox::new().unwrap());
        let rx = mailbox.clone();
        let receiver = std::thread::spawn(move || rx.recv(WAIT_FOREVER));

        crate::arch::delay(20);
        mailbox.post(99u32).unwrap();
        assert_eq!(receiver.join().unwrap(), Ok(99));
    }

    #[test]
    fn test_message_task_handles_in_order() {
        static HANDLED: AtomicUsize = AtomicUsize::new(0);

        let pump = MessageTask::new("pump", TaskPriority::Normal, 0, |n: usize| {
            // Messages arrive FIFO, so the running sum is order-sensitive.
            HANDLED.fetch_add(n, Ordering::SeqCst);
            true
        })
        .unwrap();

        pump.start(-1).unwrap();
        for n in 1..=5 {
            pump.post(n).unwrap();
        }
        pump.stop(WAIT_FOREVER).unwrap();
        assert_eq!(HANDLED.load(Ordering::SeqCst), 15);
        assert_eq!(pump.pending(), 0);
    }
}
