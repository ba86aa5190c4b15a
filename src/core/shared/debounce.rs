//! Trailing-edge debounce on the tokio runtime.
//!
//! Each `schedule` aborts the pending task and starts a new timer, so only the
//! call made after the last quiet period runs. Work that is already in flight
//! when a newer call is scheduled can check its [`Generation`] to discard its
//! result.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Generation {
    current: Arc<AtomicU64>,
    mine: u64,
}

impl Generation {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.mine
    }

    pub fn value(&self) -> u64 {
        self.mine
    }
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    /// Replaces any pending call with `task`, run after the quiet period.
    pub fn schedule<F, Fut>(&mut self, task: F) -> Generation
    where
        F: FnOnce(Generation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let generation = Generation {
            current: Arc::clone(&self.generation),
            mine: self.generation.load(Ordering::SeqCst),
        };
        let token = generation.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task(token).await;
        }));
        generation
    }

    /// Drops the pending call and invalidates every outstanding generation.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_call_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(500));

        for i in 1..=5 {
            let runs = Arc::clone(&runs);
            let last = Arc::clone(&last);
            debouncer.schedule(move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_run_and_invalidates_generation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let counter = Arc::clone(&runs);
        let generation = debouncer.schedule(move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(generation.is_current());
        assert!(debouncer.is_pending());

        debouncer.cancel();
        assert!(!generation.is_current());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
