use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Work that outlives the request that started it.
///
/// Dropping the handle detaches the task; it keeps running. Tests hold on to
/// it and call [`BackgroundTask::wait`] to observe completion.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F>(name: &'static str, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "Spawning background task");
        Self {
            name,
            handle: tokio::spawn(work),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end. A panic inside the task is logged, not propagated.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            error!(task = self.name, "Background task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_observes_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let task = BackgroundTask::spawn("flag", async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(task.name(), "flag");

        task.wait().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_waiter() {
        let task = BackgroundTask::spawn("boom", async { panic!("boom") });
        task.wait().await;
    }
}
