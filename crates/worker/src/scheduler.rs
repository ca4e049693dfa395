//! Delayed background tasks.
//!
//! Timers are best-effort: a task that has not fired when the process exits
//! is simply lost.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;

/// A unit of deferred work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

/// Cancellation handle for a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    pub(crate) fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Prevent the task from running. No effect once it has started.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the underlying tokio task has completed or been aborted.
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortHandle::is_finished)
    }
}

/// [`Scheduler`] backed by tokio timers. Must be used inside a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task.await;
            }
        });
        TaskHandle::new(cancelled, Some(join.abort_handle()))
    }
}
