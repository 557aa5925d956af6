//! Deadline scheduling for protocol timers.
//!
//! Consensus round deadlines, reconciliation feedback windows, and
//! validation deadlines all fire through here. A deadline task never holds
//! a lock across its sleep: it wakes, then re-checks entity state inside
//! the owning component, so a timer firing after the entity reached a
//! terminal status is a harmless no-op rather than a double resolution.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Schedules one-shot deadline callbacks on the Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct DeadlineTimer;

impl DeadlineTimer {
    pub fn new() -> Self {
        Self
    }

    /// Run `callback` after `delay`. The returned handle may be dropped;
    /// the task keeps running detached, which is the normal mode — entities
    /// are abandoned by reaching a terminal status, not by cancellation.
    pub fn schedule<F>(&self, label: &'static str, delay: Duration, callback: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(label, delay_ms = delay.as_millis() as u64, "deadline scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(label, "deadline fired");
            callback.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_callback_runs_after_delay() {
        let timer = DeadlineTimer::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        let handle = timer.schedule("test", Duration::from_secs(10), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Not yet fired before the deadline
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_task_survives_dropped_handle() {
        let timer = DeadlineTimer::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();

        drop(timer.schedule("test", Duration::from_secs(1), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        // Let the spawned task register its sleep before advancing the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
