use crate::ports::scheduler::{ScheduledTask, TaskScheduler};
use futures::future::BoxFuture;
use std::time::Duration;

/// Delayed tasks on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask {
        ScheduledTask::new(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn flag_task(flag: &Arc<AtomicBool>) -> BoxFuture<'static, ()> {
        let flag = flag.clone();
        async move { flag.store(true, Ordering::SeqCst) }.boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_only_after_the_delay() {
        let ran = Arc::new(AtomicBool::new(false));
        let task = TokioScheduler.schedule(Duration::from_secs(1), flag_task(&ran));

        tokio::time::advance(Duration::from_millis(999)).await;
        tokio::task::yield_now().await;
        assert!(!ran.load(Ordering::SeqCst));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(task.finished().await);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let task = TokioScheduler.schedule(Duration::from_secs(1), flag_task(&ran));
        task.cancel();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!task.finished().await);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
