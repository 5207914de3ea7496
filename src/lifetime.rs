//! Shared cancelable lifetime of a run.
//!
//! Wraps a [`CancellationToken`] with the first [`CancellationCause`] that
//! triggered it, so that every task blocked on the token can report *why* it
//! stopped.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::CancellationCause;

/// Cancelable lifetime shared by the catalog source and every worker
#[derive(Clone, Debug, Default)]
pub struct RunLifetime {
    token: CancellationToken,
    cause: Arc<OnceLock<CancellationCause>>,
}

impl RunLifetime {
    /// Create a fresh, uncancelled lifetime
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the lifetime
    ///
    /// Safe to call any number of times from any task; only the first cause is
    /// kept. Returns `true` if this call was the one that cancelled.
    pub fn cancel(&self, cause: CancellationCause) -> bool {
        let first = self.cause.set(cause).is_ok();
        if first {
            tracing::debug!(cause = %cause, "cancelling run");
        }
        self.token.cancel();
        first
    }

    /// Whether the lifetime has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cause of cancellation, once cancelled
    pub fn cause(&self) -> Option<CancellationCause> {
        self.cause.get().copied()
    }

    /// Cause to report after observing cancellation
    ///
    /// The token is only ever cancelled through [`RunLifetime::cancel`], so a
    /// missing cause can only come from a child token; it is reported as fatal.
    pub fn observed_cause(&self) -> CancellationCause {
        self.cause().unwrap_or(CancellationCause::Fatal)
    }

    /// Future that resolves once the lifetime is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Underlying token, for collaborators that only need to observe cancellation
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cause_wins() {
        let lifetime = RunLifetime::new();
        assert!(!lifetime.is_cancelled());
        assert_eq!(lifetime.cause(), None);

        assert!(lifetime.cancel(CancellationCause::UserAbort));
        assert!(!lifetime.cancel(CancellationCause::Deadline));
        assert!(!lifetime.cancel(CancellationCause::Fatal));

        assert!(lifetime.is_cancelled());
        assert_eq!(lifetime.cause(), Some(CancellationCause::UserAbort));
    }

    #[tokio::test]
    async fn clones_observe_cancellation() {
        let lifetime = RunLifetime::new();
        let observer = lifetime.clone();

        let waiter = tokio::spawn(async move {
            observer.cancelled().await;
            observer.observed_cause()
        });

        lifetime.cancel(CancellationCause::Deadline);
        let cause = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake on cancel")
            .expect("waiter should not panic");
        assert_eq!(cause, CancellationCause::Deadline);
    }
}
