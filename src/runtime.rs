//! Task spawning and timers on top of tokio
//!
//! Everything the pipeline schedules goes through here so tests can run
//! it under a paused tokio clock.

use crate::prelude::{Duration, Future};
use tokio::task::JoinHandle;

/// Handle to a spawned task. Dropping it detaches the task.
#[derive(Debug)]
pub struct TaskHandle(JoinHandle<()>);

impl TaskHandle {
    /// Check if the task is finished
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Abort the task at its next suspension point
    pub fn cancel(&self) {
        self.0.abort();
    }

    /// Wait for the task to finish, ignoring cancellation and panics
    pub async fn join(self) {
        if let Err(e) = self.0.await {
            if e.is_panic() {
                log::warn!("background task panicked: {}", e);
            }
        }
    }
}

/// Spawn a future on the current tokio runtime
pub fn spawn<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskHandle(tokio::spawn(future))
}

/// Async delay driven by the tokio clock
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_and_join() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });
        handle.join().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_task() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn(async move {
            sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
        assert!(!ran.load(Ordering::SeqCst));
    }
}
