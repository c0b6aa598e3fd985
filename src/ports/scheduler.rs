use futures::future::BoxFuture;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a task scheduled for later.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stop the task if it has not run yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task. Returns false if it was cancelled or panicked.
    pub async fn finished(self) -> bool {
        self.handle.await.is_ok()
    }
}

pub trait TaskScheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask;
}
