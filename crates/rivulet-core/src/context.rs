//! Cancellation-aware execution context.
//!
//! A `Context` is cheap to clone. Operators derive a child context for every
//! sub-query they own so that dropping the operator's [`ContextGuard`]
//! cancels the whole subtree without touching the caller.

use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token (e.g. the ScopeCache owner token).
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A context cancelled together with `self`, but cancellable on its own.
    pub fn child(&self) -> Context {
        Self {
            token: self.token.child_token(),
        }
    }

    /// A child context plus a guard that cancels it when dropped.
    pub fn scoped(&self) -> (Context, ContextGuard) {
        let child = self.child();
        let guard = ContextGuard(child.token.clone().drop_guard());
        (child, guard)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Cancels its context on drop.
pub struct ContextGuard(#[allow(dead_code)] DropGuard);
