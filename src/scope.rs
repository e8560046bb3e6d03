//! Lifetime of the UI component that hosts a store.
//!
//! Requests are never aborted. A store checks its scope when a request
//! resolves and drops the result if the host is gone.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Liveness handle shared by a host and the stores it owns. Clones observe
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope nested in this one: closed when either is closed.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    /// Resolves once the scope is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    /// Guard that closes the scope when dropped, for hosts that tie the
    /// store to their own lifetime.
    #[must_use]
    pub fn guard(&self) -> ScopeGuard {
        ScopeGuard {
            _inner: self.token.clone().drop_guard(),
        }
    }
}

/// Closes its [`Scope`] on drop.
#[derive(Debug)]
pub struct ScopeGuard {
    _inner: DropGuard,
}
