//! Bounded admission of asynchronous work

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

/// Caps how many submitted futures run at the same time.
///
/// A concurrency of `0` disables the bound entirely. Admission order among
/// waiters is left to the semaphore; a slot is released when the submitted
/// future finishes, fails or unwinds.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
    concurrency: usize,
}

impl ConcurrencyLimiter {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: (concurrency > 0).then(|| Arc::new(Semaphore::new(concurrency))),
            concurrency,
        }
    }

    /// Waits for a free slot, then drives `work` to completion while holding it.
    pub async fn submit<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = match &self.semaphore {
            Some(semaphore) => semaphore
                .acquire()
                .await
                .inspect_err(|e| warn!("Limiter closed, running unbounded: {}", e))
                .ok(),
            None => None,
        };

        work.await
    }

    /// Number of units currently admitted (always 0 when unbounded)
    pub fn in_flight(&self) -> usize {
        self.semaphore
            .as_ref()
            .map(|s| self.concurrency - s.available_permits())
            .unwrap_or(0)
    }
}
