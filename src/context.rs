//! Request-scoped cancellation and deadline carrier.
//!
//! Every downstream call made on behalf of an inbound request receives a
//! [`CallContext`]. It bundles a [`CancellationToken`] with an optional
//! absolute deadline so a client can bound its own work by whichever comes
//! first: its internal timeout, the caller's deadline, or cancellation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

/// Cancellation + deadline for a single logical request.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline that is cancelled only explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound this context by an absolute deadline. The earlier deadline wins
    /// when one is already set.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Bound this context by a timeout measured from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that is cancelled when `self` is, but can also be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels the context when dropped.
    ///
    /// HTTP handlers hold one for the lifetime of the request so that a
    /// dropped handler future (client disconnect, request timeout) aborts any
    /// work still running under this context.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded. Saturates at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Clamp `budget` to the time remaining on this context.
    pub fn budget(&self, budget: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(budget),
            None => budget,
        }
    }
}
