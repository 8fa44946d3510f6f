//! Run context: a cancellation token plus an optional deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::CancellationToken;

/// Why a guarded operation stopped before completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    /// The context deadline passed.
    DeadlineExceeded,
    /// The context was cancelled, with the recorded reason.
    Cancelled(String),
}

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
        }
    }
}

/// Cancellable context threaded through every blocking call of a run.
///
/// Child contexts created with [`RunContext::with_timeout`] share the parent's
/// token and never extend the parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: Arc<CancellationToken>,
    deadline: Option<Instant>,
}

impl RunContext {
    /// Creates a root context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a child context whose deadline is the earlier of the current
    /// one and `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Returns a child context that expires `timeout` after `now`.
    #[must_use]
    pub fn with_timeout(&self, now: Instant, timeout: Duration) -> Self {
        self.with_deadline(now + timeout)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline as seen from `now`.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Returns the shared cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Cancels this context and every context sharing its token.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the interruption that applies at `now`, if any.
    #[must_use]
    pub fn check(&self, now: Instant) -> Option<Interrupted> {
        if self.is_cancelled() {
            return Some(Interrupted::Cancelled(self.cancel_reason()));
        }
        match self.deadline {
            Some(deadline) if now >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drives `fut` until it completes, the deadline passes, or the context
    /// is cancelled, whichever happens first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled(self.cancel_reason())),
            () = expiry => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    fn cancel_reason(&self) -> String {
        self.token
            .reason()
            .unwrap_or_else(|| "cancelled".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_never_extends_parent_deadline() {
        let now = Instant::now();
        let parent = RunContext::new().with_timeout(now, Duration::from_secs(10));
        let child = parent.with_timeout(now, Duration::from_secs(60));

        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_child_narrows_deadline() {
        let now = Instant::now();
        let parent = RunContext::new().with_timeout(now, Duration::from_secs(60));
        let child = parent.with_timeout(now, Duration::from_secs(5));

        assert_eq!(child.deadline(), Some(now + Duration::from_secs(5)));
        assert_eq!(child.remaining(now), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let parent = RunContext::new();
        let child = parent.with_timeout(Instant::now(), Duration::from_secs(5));

        parent.cancel("shutdown");

        assert!(child.is_cancelled());
        assert_eq!(
            child.check(Instant::now()),
            Some(Interrupted::Cancelled("shutdown".into()))
        );
    }

    #[test]
    fn test_check_reports_expired_deadline() {
        let now = Instant::now();
        let ctx = RunContext::new().with_timeout(now, Duration::from_secs(1));

        assert_eq!(ctx.check(now), None);
        assert_eq!(
            ctx.check(now + Duration::from_secs(2)),
            Some(Interrupted::DeadlineExceeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_slow_future() {
        let ctx = RunContext::new().with_timeout(Instant::now(), Duration::from_secs(1));

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(30)))
            .await;

        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_returns_output() {
        let ctx = RunContext::new();
        let result = ctx.run(async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let ctx = RunContext::new();
        ctx.cancel("interrupted");

        let result = ctx.run(std::future::pending::<()>()).await;

        assert_eq!(result, Err(Interrupted::Cancelled("interrupted".into())));
    }
}
