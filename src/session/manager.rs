//! Current-session state and the register/login/logout flows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{Backend, CURRENT_SESSION, User, unique_id};
use crate::error::{Error, Result};
use crate::navigation::{Navigator, ROOT};
use crate::scope::Scope;

/// Snapshot of the session as seen by UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Signed-in identity, if any.
    pub current: Option<User>,
    /// True until the initial probe has resolved.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current: None,
            loading: true,
        }
    }
}

/// Owns the current identity.
///
/// Cheap to clone; clones share state, so one manager can be handed to
/// every consumer of a page.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    backend: Arc<dyn Backend>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionState>,
    probed: AtomicBool,
    scope: Scope,
}

impl SessionManager {
    /// Create a manager without probing. `loading` stays true until
    /// [`probe`](Self::probe) runs.
    pub fn new(backend: Arc<dyn Backend>, navigator: Arc<dyn Navigator>, scope: Scope) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(SessionInner {
                backend,
                navigator,
                state,
                probed: AtomicBool::new(false),
                scope,
            }),
        }
    }

    /// Create a manager and start the session probe in the background.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(backend: Arc<dyn Backend>, navigator: Arc<dyn Navigator>, scope: Scope) -> Self {
        let manager = Self::new(backend, navigator, scope);
        let probe = manager.clone();
        tokio::spawn(async move { probe.probe().await });
        manager
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State access
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> Option<User> {
        self.inner.state.borrow().current.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().current.is_some()
    }

    /// Wait for the probe to resolve (or the scope to close) and return the
    /// state at that point.
    pub async fn wait_until_ready(&self) -> SessionState {
        let mut rx = self.subscribe();
        tokio::select! {
            ready = rx.wait_for(|s| !s.loading) => match ready {
                Ok(state) => state.clone(),
                Err(_) => self.snapshot(),
            },
            () = self.inner.scope.closed() => self.snapshot(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the backend who is signed in.
    ///
    /// Runs once per manager; later calls return immediately. Every failure
    /// (no session, network) ends in the signed-out state.
    pub async fn probe(&self) {
        if self.inner.probed.swap(true, Ordering::SeqCst) {
            return;
        }

        let current = match self.inner.backend.get_account().await {
            Ok(user) => {
                debug!(name: "session.probe.found", user_id = %user.id, "Active session found");
                Some(user)
            }
            Err(e) => {
                debug!(name: "session.probe.absent", error = %e, "No current user");
                None
            }
        };

        if !self.inner.scope.is_live() {
            debug!(name: "session.probe.detached", "Scope closed before probe resolved");
            return;
        }
        self.inner.state.send_modify(|s| {
            s.current = current;
            s.loading = false;
        });
    }

    /// Create an account, then sign in with the same credentials.
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        let user_id = unique_id();
        match self
            .inner
            .backend
            .create_account(&user_id, email, password)
            .await
        {
            Ok(_) => {
                info!(name: "session.register.succeeded", user_id = %user_id, "Account created");
            }
            Err(e) => {
                warn!(name: "session.register.failed", error = %e, "Account creation failed");
                return Err(e);
            }
        }
        self.login(email, password).await
    }

    /// Open an email/password session and load the identity behind it.
    ///
    /// Navigates to the application root on success. On failure the
    /// current identity is left as it was and no navigation happens.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = match self.sign_in(email, password).await {
            Ok(user) => user,
            Err(e) => {
                warn!(name: "session.login.failed", error = %e, kind = ?e.kind(), "Login failed");
                return Err(e);
            }
        };

        self.ensure_live()?;
        self.inner.state.send_modify(|s| s.current = Some(user.clone()));
        info!(name: "session.login.succeeded", user_id = %user.id, "Logged in");
        self.inner.navigator.navigate(ROOT);
        Ok(user)
    }

    /// End the current session and navigate to the application root.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.inner.backend.delete_session(CURRENT_SESSION).await {
            warn!(name: "session.logout.failed", error = %e, "Logout failed");
            return Err(e);
        }

        self.ensure_live()?;
        self.inner.state.send_modify(|s| s.current = None);
        info!(name: "session.logout.succeeded", "Logged out");
        self.inner.navigator.navigate(ROOT);
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let session = self
            .inner
            .backend
            .create_email_password_session(email, password)
            .await?;
        debug!(name: "session.created", session_id = %session.id, "Session created");
        self.inner.backend.get_account().await
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.scope.is_live() {
            Ok(())
        } else {
            debug!(name: "session.detached", "Scope closed before request resolved");
            Err(Error::Detached)
        }
    }
}
