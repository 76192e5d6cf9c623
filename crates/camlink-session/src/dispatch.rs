use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

type Task = Box<dyn FnOnce() + Send>;

/// A task queue for marshaling work back to a single-threaded consumer
/// context.
///
/// Producers (a session's worker thread, a transport callback) `push`
/// closures from any thread; the consumer calls `drain` from the one thread
/// that owns its state. The queue is constructed and closed explicitly —
/// there is no ambient singleton and nothing recreates itself behind the
/// caller's back.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: Mutex<VecDeque<Task>>,
    closed: AtomicBool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task. Returns false if the queue has been closed, in which
    /// case the task is dropped.
    pub fn push(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            debug!("task dropped: queue closed");
            return false;
        }
        self.lock_tasks().push_back(Box::new(task));
        true
    }

    /// Run every queued task on the calling thread, in push order. Returns
    /// how many ran. Tasks pushed while draining run on the next drain.
    pub fn drain(&self) -> usize {
        let tasks = std::mem::take(&mut *self.lock_tasks());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Stop accepting tasks. Already-queued tasks remain drainable.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.lock_tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_tasks().is_empty()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
