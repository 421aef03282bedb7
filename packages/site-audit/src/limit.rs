//! Bounded concurrency primitive.
//!
//! Wraps zero-argument async operations and guarantees at most N run
//! concurrently, FIFO. Each run owns its own limiter: two concurrent audits
//! must never share slots, so this is never process-wide.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Hard upper bound on the fan-out, regardless of configuration.
pub const MAX_CONCURRENCY: usize = 6;

/// A per-run concurrency limiter.
///
/// `tokio::sync::Semaphore` queues waiters in FIFO order, which gives the
/// queue discipline the collectors rely on.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimit {
    /// Create a limiter with the given slot count, capped at
    /// [`MAX_CONCURRENCY`].
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_CONCURRENCY);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// The effective slot count.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Currently free slots (for tests and metrics).
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run an operation once a slot is free. The permit is held for the
    /// whole operation and released on every exit path, including panic
    /// unwinding inside `op` (the permit guard drops either way).
    pub async fn run<F, T>(&self, op: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore never closes");
        op.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let limit = ConcurrencyLimit::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limit = limit.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                limit
                    .run(async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_limit_capped_at_six() {
        let limit = ConcurrencyLimit::new(100);
        assert_eq!(limit.limit(), MAX_CONCURRENCY);

        let limit = ConcurrencyLimit::new(0);
        assert_eq!(limit.limit(), 1);
    }

    #[tokio::test]
    async fn test_permits_released_after_run() {
        let limit = ConcurrencyLimit::new(2);
        limit.run(async {}).await;
        limit.run(async {}).await;
        assert_eq!(limit.available(), 2);
    }
}
