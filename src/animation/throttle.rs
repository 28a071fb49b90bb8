use crate::prelude::{Arc, Duration, Future};
use crate::runtime::{self, TaskHandle};
use std::sync::atomic::{AtomicBool, Ordering};

/// Coalesces redraw requests to at most one per frame tick.
///
/// The first request arms a timer and sets the pending flag; requests
/// arriving before the tick fires are dropped. The flag is cleared when the
/// tick runs, just before the redraw itself.
#[derive(Debug, Clone)]
pub struct RedrawThrottle {
    pending: Arc<AtomicBool>,
    interval: Duration,
}

impl RedrawThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            interval,
        }
    }

    /// Schedule `redraw` for the next tick. Returns `None` when one is
    /// already scheduled.
    pub fn request<F, Fut>(&self, redraw: F) -> Option<TaskHandle>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.pending.swap(true, Ordering::AcqRel) {
            return None;
        }

        let pending = Arc::clone(&self.pending);
        let interval = self.interval;
        Some(runtime::spawn(async move {
            runtime::sleep(interval).await;
            pending.store(false, Ordering::Release);
            redraw().await;
        }))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Forget a scheduled tick whose task was aborted
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_requests_within_a_tick_coalesce() {
        let throttle = RedrawThrottle::new(Duration::from_millis(16));
        let redraws = Arc::new(AtomicUsize::new(0));

        let mut scheduled = 0;
        for _ in 0..10 {
            let redraws = redraws.clone();
            if throttle
                .request(move || async move {
                    redraws.fetch_add(1, Ordering::SeqCst);
                })
                .is_some()
            {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 1);
        assert!(throttle.is_pending());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
        assert!(!throttle.is_pending());

        // The next tick accepts a new request
        let redraws2 = redraws.clone();
        let handle = throttle.request(move || async move {
            redraws2.fetch_add(1, Ordering::SeqCst);
        });
        handle.unwrap().join().await;
        assert_eq!(redraws.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_abort() {
        let throttle = RedrawThrottle::new(Duration::from_millis(16));
        let handle = throttle.request(|| async {}).unwrap();
        handle.cancel();
        assert!(throttle.is_pending());

        throttle.reset();
        assert!(throttle.request(|| async {}).is_some());
    }
}
