//! Per-attempt time budget.

use std::future::Future;
use std::time::Duration;

/// Default budget for one attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Returned when an attempt outlives its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub after: Duration,
}

/// Bounds a single attempt to a fixed duration.
///
/// On expiry the guarded future is dropped, which cancels the in-flight
/// request. The timer lives only as long as [`run`](Self::run), so it can
/// never fire after the attempt has resolved.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    budget: Duration,
}

impl TimeoutGuard {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Run `attempt` to completion or until the budget elapses.
    pub async fn run<F>(&self, attempt: F) -> Result<F::Output, TimedOut>
    where
        F: Future,
    {
        tokio::time::timeout(self.budget, attempt)
            .await
            .map_err(|_| TimedOut { after: self.budget })
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_budget() {
        let guard = TimeoutGuard::new(Duration::from_secs(1));
        let out = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                42
            })
            .await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_and_drops_attempt() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let guard = TimeoutGuard::default();

        let out = guard
            .run(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .await;

        assert_eq!(
            out,
            Err(TimedOut {
                after: Duration::from_millis(30_000)
            })
        );
        // The cancelled attempt never resumes.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
