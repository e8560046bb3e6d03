//! The idea feed store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::idea::{Idea, IdeaInput};
use crate::backend::{Backend, CREATED_AT, Query, unique_id};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::scope::Scope;

/// Default size of the feed window.
pub const DEFAULT_LIMIT: usize = 10;

/// How the feed is reconciled after a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovePolicy {
    /// Reload the window so it is refilled up to the limit.
    #[default]
    Refetch,
    /// Drop the id locally; the window may shrink below the limit.
    LocalFilter,
}

/// Where the feed is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Uninitialized,
    Loading,
    Ready,
}

/// Snapshot of the feed as seen by UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    /// Newest first, at most `limit` entries.
    pub items: Vec<Idea>,
    pub loading: bool,
    pub phase: FeedPhase,
    /// Transient message about the last failed operation.
    pub notice: Option<String>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            phase: FeedPhase::Uninitialized,
            notice: None,
        }
    }
}

/// Where ideas live and how the window behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub database_id: String,
    pub collection_id: String,
    pub limit: usize,
    pub remove_policy: RemovePolicy,
}

impl FeedSettings {
    pub fn new(database_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            collection_id: collection_id.into(),
            limit: DEFAULT_LIMIT,
            remove_policy: RemovePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_remove_policy(mut self, policy: RemovePolicy) -> Self {
        self.remove_policy = policy;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            database_id: config.backend.database_id.clone(),
            collection_id: config.backend.collection_id.clone(),
            limit: config.feed.limit,
            remove_policy: config.feed.remove_policy,
        }
    }
}

/// Ordered, capped list of the most recent ideas.
///
/// Every operation returns its outcome; failures are also logged and left
/// as a transient [`FeedState::notice`]. A successful `add` applies the
/// server's echo of the new document directly (no reload), so the window
/// reflects server-confirmed writes in the order their responses arrive.
///
/// Two bindings share this one implementation:
/// - [`IdeaFeedStore::new`]: a handle whose clones all see the same feed.
/// - [`IdeaFeedStore::mount`]: a store tied to a host [`Scope`] that loads
///   on creation and ignores results arriving after the scope closes.
#[derive(Debug, Clone)]
pub struct IdeaFeedStore {
    inner: Arc<FeedInner>,
}

#[derive(Debug)]
struct FeedInner {
    backend: Arc<dyn Backend>,
    settings: FeedSettings,
    state: watch::Sender<FeedState>,
    scope: Scope,
    // fetches started and not yet finished
    fetches: AtomicUsize,
}

/// One outstanding fetch. The last ticket to drop clears `loading`.
#[derive(Debug)]
struct FetchTicket<'a> {
    inner: &'a FeedInner,
}

impl<'a> FetchTicket<'a> {
    fn issue(inner: &'a FeedInner) -> Self {
        inner.fetches.fetch_add(1, Ordering::SeqCst);
        inner.state.send_modify(|s| {
            s.loading = true;
            s.phase = FeedPhase::Loading;
        });
        Self { inner }
    }

    /// Whether another fetch is still in flight.
    fn others_pending(&self) -> bool {
        self.inner.fetches.load(Ordering::SeqCst) > 1
    }
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        let remaining = self.inner.fetches.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.inner.scope.is_live() {
            self.inner.state.send_if_modified(|s| {
                let changed = s.loading;
                s.loading = false;
                if s.phase == FeedPhase::Loading {
                    s.phase = FeedPhase::Ready;
                }
                changed
            });
        }
    }
}

impl IdeaFeedStore {
    /// Shared binding. Nothing is loaded until [`fetch`](Self::fetch).
    pub fn new(backend: Arc<dyn Backend>, settings: FeedSettings) -> Self {
        Self::with_scope(backend, settings, Scope::new())
    }

    /// Scoped binding: starts the initial load in the background.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(backend: Arc<dyn Backend>, settings: FeedSettings, scope: Scope) -> Self {
        let store = Self::with_scope(backend, settings, scope);
        let loader = store.clone();
        tokio::spawn(async move {
            // Outcome already logged and recorded in state.
            let _ = loader.fetch().await;
        });
        store
    }

    fn with_scope(backend: Arc<dyn Backend>, settings: FeedSettings, scope: Scope) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            inner: Arc::new(FeedInner {
                backend,
                settings,
                state,
                scope,
                fetches: AtomicUsize::new(0),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State access
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> FeedState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn items(&self) -> Vec<Idea> {
        self.inner.state.borrow().items.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    #[must_use]
    pub fn phase(&self) -> FeedPhase {
        self.inner.state.borrow().phase
    }

    #[must_use]
    pub fn settings(&self) -> &FeedSettings {
        &self.inner.settings
    }

    pub fn dismiss_notice(&self) {
        self.inner.state.send_if_modified(|s| s.notice.take().is_some());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the window with the newest `limit` ideas.
    ///
    /// `loading` stays set until the last of several overlapping fetches
    /// has resolved.
    pub async fn fetch(&self) -> Result<Vec<Idea>> {
        let settings = &self.inner.settings;
        self.ensure_live()?;
        let ticket = FetchTicket::issue(&self.inner);

        let queries = [Query::order_desc(CREATED_AT), Query::limit(settings.limit)];
        let result = self
            .inner
            .backend
            .list_documents(&settings.database_id, &settings.collection_id, &queries)
            .await
            .and_then(|list| {
                list.documents
                    .into_iter()
                    .map(Idea::try_from)
                    .collect::<Result<Vec<_>>>()
            });

        let mut ideas = match result {
            Ok(ideas) => ideas,
            Err(e) => return Err(self.fail("fetch", e)),
        };
        if ideas.len() > settings.limit {
            debug!(
                name: "feed.fetch.overlong",
                returned = ideas.len(),
                limit = settings.limit,
                "Backend returned more than the requested limit"
            );
            ideas.truncate(settings.limit);
        }

        self.ensure_live()?;
        let loading = ticket.others_pending();
        self.inner.state.send_modify(|s| {
            s.items.clone_from(&ideas);
            s.loading = loading;
            s.phase = if loading {
                FeedPhase::Loading
            } else {
                FeedPhase::Ready
            };
            s.notice = None;
        });
        debug!(name: "feed.fetch.succeeded", count = ideas.len(), "Feed loaded");
        Ok(ideas)
    }

    /// Create an idea and put the server's copy at the top of the window.
    pub async fn add(&self, input: IdeaInput) -> Result<Idea> {
        if let Err(e) = input.validate() {
            return Err(self.fail("add", e));
        }
        let settings = &self.inner.settings;

        let result = match input.to_data() {
            Ok(data) => self
                .inner
                .backend
                .create_document(
                    &settings.database_id,
                    &settings.collection_id,
                    &unique_id(),
                    data,
                    &input.permissions(),
                )
                .await
                .and_then(Idea::try_from),
            Err(e) => Err(e),
        };
        let idea = match result {
            Ok(idea) => idea,
            Err(e) => return Err(self.fail("add", e)),
        };

        self.ensure_live()?;
        let limit = settings.limit;
        self.inner.state.send_modify(|s| {
            s.items.insert(0, idea.clone());
            s.items.truncate(limit);
            s.notice = None;
        });
        info!(name: "feed.add.succeeded", idea_id = %idea.id, "Idea added");
        Ok(idea)
    }

    /// Delete an idea, then reconcile the window per [`RemovePolicy`].
    ///
    /// Succeeds once the delete does. A reload that fails afterwards falls
    /// back to dropping the id locally and is reported through the notice.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let settings = &self.inner.settings;
        if let Err(e) = self
            .inner
            .backend
            .delete_document(&settings.database_id, &settings.collection_id, id)
            .await
        {
            return Err(self.fail("remove", e));
        }
        info!(name: "feed.remove.succeeded", idea_id = %id, "Idea removed");

        match settings.remove_policy {
            RemovePolicy::Refetch => match self.fetch().await {
                Ok(_) => Ok(()),
                Err(Error::Detached) => Err(Error::Detached),
                Err(e) => {
                    // The delete went through; only the reload failed and its
                    // notice stays up.
                    debug!(
                        name: "feed.remove.reload_failed",
                        idea_id = %id,
                        error = %e,
                        "Reload after delete failed; dropping the idea locally"
                    );
                    self.drop_local(id, false)
                }
            },
            RemovePolicy::LocalFilter => self.drop_local(id, true),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<()> {
        if self.inner.scope.is_live() {
            Ok(())
        } else {
            debug!(name: "feed.detached", "Scope closed before request resolved");
            Err(Error::Detached)
        }
    }

    fn drop_local(&self, id: &str, clear_notice: bool) -> Result<()> {
        self.ensure_live()?;
        self.inner.state.send_modify(|s| {
            s.items.retain(|idea| idea.id != id);
            if clear_notice {
                s.notice = None;
            }
        });
        Ok(())
    }

    /// Log a failed operation and record it as a notice; items are untouched.
    fn fail(&self, op: &'static str, err: Error) -> Error {
        warn!(
            name: "feed.operation.failed",
            op = op,
            kind = ?err.kind(),
            error = %err,
            "Feed operation failed"
        );
        if self.inner.scope.is_live() {
            let notice = format!("{op} failed: {err}");
            self.inner.state.send_modify(|s| s.notice = Some(notice));
        }
        err
    }
}
