//! Task lifecycle
//!
//! A task wraps a native schedulable unit with start/join/wait/signal
//! semantics. Status transitions are published through an event group
//! (`STARTED`, `JOINABLE`); directed signaling goes through a private
//! wait-semaphore, which is what condition variables build on.

pub mod mailbox;

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use bitflags::bitflags;
use lazy_static::lazy_static;
use spin::RwLock;

use crate::arch::{self, LockHandle, LockKind, TaskHandle};
use crate::config::DEFAULT_STACK_SIZE;
use crate::error::{SyncError, SyncResult};
use crate::lock::RawLock;
use crate::sync::condvar::ConditionVariable;
use crate::sync::event_group::EventGroup;
use crate::tick::{Ticks, NO_WAIT, WAIT_FOREVER};
use crate::{log_debug, log_error, log_warn};

bitflags! {
    /// Status bits kept in a task's event group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskEvents: u32 {
        /// The task body has begun executing.
        const STARTED = 1;
        /// The task body has returned; joins complete immediately.
        const JOINABLE = 2;
    }
}

/// Scheduling priority, lowest to highest. The hosted port records but does
/// not enforce it; native ports map it onto the platform's priority range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskPriority {
    Idle = 0,
    Low = 1,
    Normal = 2,
    HalfCritical = 3,
    Urgent = 4,
    Critical = 5,
}

impl TaskPriority {
    pub fn as_native(self) -> u8 {
        self as u8
    }
}

/// Coarse lifecycle state. Suspended/Blocked are sub-states of Running
/// observable through the platform, not tracked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unstarted,
    Running,
    Terminated,
}

type TaskBody = Box<dyn FnOnce() -> i32 + Send + 'static>;

/// Shared task state; referenced by the owning `Task`, the registry, and
/// (weakly) by condition-variable wait lists.
pub(crate) struct TaskInner {
    name: String,
    stack_size: usize,
    priority: spin::Mutex<TaskPriority>,
    running: AtomicBool,
    ever_started: AtomicBool,
    id: AtomicU32,
    affinity: AtomicI32,
    started_at: AtomicU32,
    handle: spin::Mutex<Option<TaskHandle>>,
    events: spin::Mutex<Option<EventGroup>>,
    /// Private signaling gate: created taken, given by `signal`, taken by
    /// the condition-variable wait protocol. A semaphore keeps state, which
    /// closes the race between dropping the caller's lock and blocking.
    wait_sem: LockHandle,
    /// Held by `start()` while it publishes the handle so the body cannot
    /// observe a half-initialized task.
    continue_gate: LockHandle,
    retval: spin::Mutex<Option<i32>>,
    body: spin::Mutex<Option<TaskBody>>,
}

// ============================================================================
// Task Registry
// ============================================================================

static NEXT_TASK_ID: AtomicU32 = AtomicU32::new(1);

lazy_static! {
    /// Global registry: native handle id → shared task state. Spawned tasks
    /// deregister when their body exits; anonymous entries for foreign
    /// contexts stay for the process lifetime.
    static ref REGISTRY: RwLock<BTreeMap<u64, Arc<TaskInner>>> = RwLock::new(BTreeMap::new());
}

fn next_task_id() -> u32 {
    NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst)
}

impl TaskInner {
    fn new(
        name: &str,
        priority: TaskPriority,
        stack_size: usize,
        body: Option<TaskBody>,
    ) -> SyncResult<Self> {
        let wait_sem = arch::lock_create(LockKind::Simple).ok_or(SyncError::NotInitialized)?;
        // Starts life taken so the first wait blocks until a signal.
        wait_sem.take(NO_WAIT);
        let continue_gate = arch::lock_create(LockKind::Simple).ok_or(SyncError::NotInitialized)?;

        Ok(Self {
            name: name.to_string(),
            stack_size,
            priority: spin::Mutex::new(priority),
            running: AtomicBool::new(false),
            ever_started: AtomicBool::new(false),
            id: AtomicU32::new(0),
            affinity: AtomicI32::new(-1),
            started_at: AtomicU32::new(0),
            handle: spin::Mutex::new(None),
            events: spin::Mutex::new(None),
            wait_sem,
            continue_gate,
            retval: spin::Mutex::new(None),
            body: spin::Mutex::new(body),
        })
    }

    /// Registry entry for a context this crate did not spawn.
    fn anonymous(handle: TaskHandle) -> SyncResult<Self> {
        let inner = Self::new("external", TaskPriority::Normal, 0, None)?;
        inner.running.store(true, Ordering::Release);
        inner.ever_started.store(true, Ordering::Release);
        *inner.handle.lock() = Some(handle);
        *inner.events.lock() = Some(EventGroup::new()?);
        Ok(inner)
    }

    /// Release this task's private wait-semaphore and poke the native
    /// notification, waking a pending condition-variable wait.
    pub(crate) fn signal(&self) {
        let _ = self.wait_sem.give();
        if let Some(handle) = *self.handle.lock() {
            arch::notify_give(&handle);
        }
    }

    /// Condition-variable wait protocol: register on the list, release the
    /// caller's lock, block on the private semaphore, reacquire the lock no
    /// matter how the wait ended, then drain any pending native
    /// notification without blocking.
    pub(crate) fn block_on_cv<L: RawLock>(
        self: &Arc<Self>,
        cv: &ConditionVariable,
        lock: &L,
        timeout: Ticks,
    ) -> SyncResult<()> {
        cv.enqueue(Arc::downgrade(self));
        if let Err(e) = lock.unlock() {
            // Caller did not hold the lock; undo the registration.
            cv.remove(self);
            return Err(e);
        }
        let signaled = self.wait_sem.take(timeout);
        lock.lock(WAIT_FOREVER)?;
        let _ = arch::notify_take(true, NO_WAIT);

        if signaled {
            Ok(())
        } else {
            if !cv.remove(self) {
                // A signal popped this task right as the timeout fired;
                // consume the token so it cannot leak into a later wait.
                let _ = self.wait_sem.take(NO_WAIT);
            }
            Err(SyncError::Timeout)
        }
    }

    fn events(&self) -> Option<EventGroup> {
        self.events.lock().clone()
    }
}

/// Body wrapper: runs exactly once per start.
fn task_entry(inner: Arc<TaskInner>, body: TaskBody) {
    // Wait for start() to finish publishing handle and id.
    let _ = inner.continue_gate.take(WAIT_FOREVER);
    let _ = inner.continue_gate.give();

    if let Some(events) = inner.events() {
        events.set(TaskEvents::STARTED.bits());
    }
    inner.running.store(true, Ordering::Release);
    log_debug!("[TASK] {} started", inner.name);

    let ret = body();

    *inner.retval.lock() = Some(ret);
    inner.running.store(false, Ordering::Release);

    // Release the native handle before declaring joinability.
    let handle = inner.handle.lock().take();
    if let Some(h) = handle {
        REGISTRY.write().remove(&h.id);
    }

    if let Some(events) = inner.events() {
        // Setting an already-set bit is a no-op, so this stays one-shot.
        events.set(TaskEvents::JOINABLE.bits());
    }
    log_debug!("[TASK] {} exited with code {}", inner.name, ret);
}

/// Builder for a task's static parameters.
pub struct TaskBuilder {
    name: String,
    priority: TaskPriority,
    stack_size: usize,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            priority: TaskPriority::Normal,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Stack-size hint in bytes; zero leaves the platform default.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn build<F>(self, body: F) -> SyncResult<Task>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let inner = TaskInner::new(
            &self.name,
            self.priority,
            self.stack_size,
            Some(Box::new(body)),
        )?;
        Ok(Task {
            inner: Arc::new(inner),
        })
    }
}

/// Schedulable unit with start/join/wait/signal semantics.
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Task with default priority and stack size.
    pub fn new<F>(name: &str, body: F) -> SyncResult<Self>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        TaskBuilder::new(name).build(body)
    }

    pub fn builder(name: &str) -> TaskBuilder {
        TaskBuilder::new(name)
    }

    /// The calling context's task. Foreign threads are registered with an
    /// anonymous entry so directed signaling works from anywhere.
    pub fn current() -> SyncResult<Task> {
        let handle = arch::current_handle();
        if let Some(inner) = REGISTRY.read().get(&handle.id) {
            return Ok(Task {
                inner: inner.clone(),
            });
        }
        let inner = Arc::new(TaskInner::anonymous(handle)?);
        REGISTRY.write().insert(handle.id, inner.clone());
        Ok(Task { inner })
    }

    pub(crate) fn inner(&self) -> &Arc<TaskInner> {
        &self.inner
    }

    /// Spawn the native task on `affinity_core` (-1 for any core). The
    /// STARTED bit is set by the spawned body; the handle is assigned
    /// before this returns.
    pub fn start(&self, affinity_core: i32) -> SyncResult<()> {
        let inner = &self.inner;

        if inner.running.load(Ordering::Acquire) {
            return Err(SyncError::AlreadyRunning);
        }
        // The body is consumed by the one successful start; a task cannot
        // be restarted after it terminates.
        let body = inner
            .body
            .lock()
            .take()
            .ok_or(SyncError::AlreadyRunning)?;

        *inner.events.lock() = Some(EventGroup::new()?);
        inner.ever_started.store(true, Ordering::Release);
        inner.affinity.store(affinity_core, Ordering::Release);

        if !inner.continue_gate.take(WAIT_FOREVER) {
            return Err(SyncError::Failed);
        }

        let entry_inner = inner.clone();
        let entry: Box<dyn FnOnce() + Send> = Box::new(move || task_entry(entry_inner, body));
        let priority = *inner.priority.lock();

        let handle = match arch::spawn(
            entry,
            &inner.name,
            inner.stack_size,
            priority.as_native(),
            affinity_core,
        ) {
            Ok(handle) => handle,
            Err(_) => {
                let _ = inner.continue_gate.give();
                log_error!("[TASK] {}: native spawn failed", inner.name);
                return Err(SyncError::SpawnFailed);
            }
        };

        inner.id.store(next_task_id(), Ordering::Release);
        inner.started_at.store(arch::tick_count(), Ordering::Release);
        *inner.handle.lock() = Some(handle);
        REGISTRY.write().insert(handle.id, inner.clone());

        let _ = inner.continue_gate.give();
        Ok(())
    }

    /// Block until the task body has returned. `NotRunning` if the task was
    /// never started; `SelfJoinDeadlock` from the task's own context. After
    /// a successful join, further joins return immediately.
    pub fn join(&self, timeout: Ticks) -> SyncResult<()> {
        self.await_event(TaskEvents::JOINABLE, timeout)
    }

    /// Block until the task body has begun executing. Same contract as
    /// `join`, but on the STARTED bit.
    pub fn wait(&self, timeout: Ticks) -> SyncResult<()> {
        self.await_event(TaskEvents::STARTED, timeout)
    }

    fn await_event(&self, event: TaskEvents, timeout: Ticks) -> SyncResult<()> {
        let inner = &self.inner;
        if !inner.ever_started.load(Ordering::Acquire) {
            return Err(SyncError::NotRunning);
        }
        if let Some(handle) = *inner.handle.lock() {
            if handle == arch::current_handle() {
                return Err(SyncError::SelfJoinDeadlock);
            }
        }
        let events = inner.events().ok_or(SyncError::NotRunning)?;
        events.wait(event.bits(), false, true, timeout).map(|_| ())
    }

    /// Wake this task's pending condition-variable wait.
    pub fn signal(&self) {
        self.inner.signal();
    }

    /// Forcibly terminate the task.
    ///
    /// Any locks the task holds stay locked — this is the caller's hazard
    /// to manage. JOINABLE is not set: a killed task is not joinable. The
    /// hosted port cannot delete a host thread, so there the task is only
    /// marked terminated.
    pub fn kill(&self) -> SyncResult<()> {
        let inner = &self.inner;
        if !inner.running.load(Ordering::Acquire) {
            return Err(SyncError::NotRunning);
        }

        let handle = inner.handle.lock().take();
        if let Some(h) = handle {
            if !arch::kill(&h) {
                log_warn!(
                    "[TASK] {}: native delete unavailable, marking terminated only",
                    inner.name
                );
            }
            REGISTRY.write().remove(&h.id);
        }
        inner.running.store(false, Ordering::Release);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Numeric id assigned at start; zero before the first start.
    pub fn id(&self) -> u32 {
        self.inner.id.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn priority(&self) -> TaskPriority {
        *self.inner.priority.lock()
    }

    /// Update the cached priority. Takes effect on the next start; native
    /// ports additionally forward it to a live task.
    pub fn set_priority(&self, priority: TaskPriority) {
        *self.inner.priority.lock() = priority;
    }

    pub fn stack_size(&self) -> usize {
        self.inner.stack_size
    }

    pub fn affinity_core(&self) -> i32 {
        self.inner.affinity.load(Ordering::Acquire)
    }

    /// The body's return value; `None` until the task has terminated.
    pub fn return_value(&self) -> Option<i32> {
        if self.inner.running.load(Ordering::Acquire) {
            return None;
        }
        *self.inner.retval.lock()
    }

    pub fn state(&self) -> TaskState {
        let inner = &self.inner;
        if !inner.ever_started.load(Ordering::Acquire) {
            TaskState::Unstarted
        } else if inner.handle.lock().is_some() {
            TaskState::Running
        } else {
            TaskState::Terminated
        }
    }

    /// Ticks elapsed since the task was started; zero if never started.
    pub fn time_since_start(&self) -> Ticks {
        if !self.inner.ever_started.load(Ordering::Acquire) {
            return 0;
        }
        arch::tick_count().wrapping_sub(self.inner.started_at.load(Ordering::Acquire))
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // The registry still holds the shared state of a live task; the
        // native side is detached, never force-deleted here.
        if self.inner.running.load(Ordering::Acquire) {
            log_debug!("[TASK] {} handle dropped while running", self.inner.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_unstarted_fails_fast() {
        let task = Task::new("idle", || 0).unwrap();
        let begin = arch::tick_count();
        assert_eq!(task.join(WAIT_FOREVER), Err(SyncError::NotRunning));
        assert_eq!(task.wait(WAIT_FOREVER), Err(SyncError::NotRunning));
        assert!(arch::tick_count().wrapping_sub(begin) < 100);
        assert_eq!(task.state(), TaskState::Unstarted);
    }

    #[test]
    fn test_start_runs_body_and_captures_return() {
        let task = Task::new("answer", || 42).unwrap();
        assert_eq!(task.return_value(), None);
        task.start(-1).unwrap();

        task.wait(WAIT_FOREVER).unwrap();
        task.join(WAIT_FOREVER).unwrap();
        // A second join must not block again.
        task.join(NO_WAIT).unwrap();

        assert_eq!(task.return_value(), Some(42));
        assert_eq!(task.state(), TaskState::Terminated);
        assert!(!task.is_running());
        assert_ne!(task.id(), 0);
    }

    #[test]
    fn test_double_start_rejected() {
        let task = Task::builder("once")
            .priority(TaskPriority::Low)
            .build(|| {
                arch::delay(30);
                0
            })
            .unwrap();
        task.start(-1).unwrap();
        assert_eq!(task.start(-1), Err(SyncError::AlreadyRunning));
        task.join(WAIT_FOREVER).unwrap();
        // Terminated tasks cannot be restarted either.
        assert_eq!(task.start(-1), Err(SyncError::AlreadyRunning));
    }

    #[test]
    fn test_join_times_out_while_running() {
        let task = Task::new("slow", || {
            arch::delay(100);
            7
        })
        .unwrap();
        task.start(-1).unwrap();
        assert_eq!(task.join(10), Err(SyncError::Timeout));
        task.join(WAIT_FOREVER).unwrap();
        assert_eq!(task.return_value(), Some(7));
    }

    #[test]
    fn test_self_join_detected() {
        use std::sync::mpsc;
        let (tx, rx) = mpsc::channel();
        let task: Arc<spin::Mutex<Option<Task>>> = Arc::new(spin::Mutex::new(None));
        let slot = task.clone();

        let t = Task::new("narcissus", move || {
            // Wait until our own handle is visible, then try to join it.
            loop {
                if let Some(me) = slot.lock().as_ref() {
                    let _ = tx.send(me.join(WAIT_FOREVER));
                    break;
                }
                arch::yield_now();
            }
            0
        })
        .unwrap();
        t.start(-1).unwrap();
        *task.lock() = Some(Task {
            inner: t.inner().clone(),
        });

        assert_eq!(rx.recv().unwrap(), Err(SyncError::SelfJoinDeadlock));
        t.join(WAIT_FOREVER).unwrap();
    }

    #[test]
    fn test_priority_order() {
        assert!(TaskPriority::Idle < TaskPriority::Low);
        assert!(TaskPriority::Normal < TaskPriority::HalfCritical);
        assert!(TaskPriority::Urgent < TaskPriority::Critical);
    }

    #[test]
    fn test_current_from_foreign_thread() {
        let me = Task::current().unwrap();
        assert!(me.is_running());
        let again = Task::current().unwrap();
        assert!(Arc::ptr_eq(me.inner(), again.inner()));
    }

    #[test]
    fn test_kill_marks_terminated() {
        let task = Task::new("victim", || {
            arch::delay(200);
            0
        })
        .unwrap();
        task.start(-1).unwrap();
        task.wait(WAIT_FOREVER).unwrap();
        // STARTED is published just before the running flag flips.
        while !task.is_running() {
            arch::yield_now();
        }
        task.kill().unwrap();
        assert!(!task.is_running());
        assert_eq!(task.state(), TaskState::Terminated);
        assert_eq!(task.kill(), Err(SyncError::NotRunning));
    }
}
