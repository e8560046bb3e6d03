//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use idea_board::{Error, Result};
use idea_board::backend::{
    Backend, Document, DocumentList, MemoryBackend, Permission, Query, SessionInfo, User,
};
use idea_board::feed::FeedSettings;
use serde_json::Value;
use tokio::sync::oneshot;

pub const DATABASE: &str = "db";
pub const COLLECTION: &str = "ideas";
pub const PASSWORD: &str = "password123";

pub fn settings() -> FeedSettings {
    FeedSettings::new(DATABASE, COLLECTION)
}

/// Create an account on `backend` and open a session for it.
pub async fn sign_in(backend: &dyn Backend, email: &str) -> User {
    backend
        .create_account(&idea_board::backend::unique_id(), email, PASSWORD)
        .await
        .expect("create account");
    backend
        .create_email_password_session(email, PASSWORD)
        .await
        .expect("create session");
    backend.get_account().await.expect("get account")
}

/// Memory backend whose document calls can be held until the test releases
/// them, so tests decide the order in which responses arrive. List calls can
/// also be made to fail while every other call keeps working.
#[derive(Debug, Default)]
pub struct GatedBackend {
    pub inner: MemoryBackend,
    // idea title -> release signal for its create call
    create_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    // one gate per upcoming list call, in call order
    list_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    fail_lists: AtomicBool,
}

impl GatedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold the next create of an idea titled `title` until the sender fires.
    pub fn gate_create(&self, title: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.create_gates
            .lock()
            .unwrap()
            .insert(title.to_string(), rx);
        tx
    }

    /// Hold the next ungated list call until the sender fires.
    pub fn gate_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// List gates not yet picked up by a list call.
    pub fn unclaimed_list_gates(&self) -> usize {
        self.list_gates.lock().unwrap().len()
    }

    /// Make list calls fail with a 503 until turned off again.
    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for GatedBackend {
    async fn create_account(&self, user_id: &str, email: &str, password: &str) -> Result<User> {
        self.inner.create_account(user_id, email, password).await
    }

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionInfo> {
        self.inner
            .create_email_password_session(email, password)
            .await
    }

    async fn get_account(&self) -> Result<User> {
        self.inner.get_account().await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.inner.delete_session(session_id).await
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList> {
        let gate = self.list_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(Error::from_status(503, "down"));
        }
        self.inner
            .list_documents(database_id, collection_id, queries)
            .await
    }

    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
        permissions: &[Permission],
    ) -> Result<Document> {
        let title = data
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let gate = self.create_gates.lock().unwrap().remove(&title);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner
            .create_document(database_id, collection_id, document_id, data, permissions)
            .await
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        self.inner
            .delete_document(database_id, collection_id, document_id)
            .await
    }
}
