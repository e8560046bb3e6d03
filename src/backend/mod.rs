//! Backend service surface.
//!
//! Everything the application persists or authenticates goes through the
//! [`Backend`] trait. Two implementations ship with the crate:
//!
//! - [`AppwriteClient`]: REST client for an Appwrite-compatible service.
//! - [`MemoryBackend`]: in-process stand-in used by tests and offline mode.

mod client;
mod memory;
mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use client::AppwriteClient;
pub use memory::MemoryBackend;
pub use types::{
    Action, CREATED_AT, CURRENT_SESSION, Document, DocumentList, Permission, Query, Role,
    SessionInfo, User, unique_id, validate_id,
};

#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    // Identity
    async fn create_account(&self, user_id: &str, email: &str, password: &str) -> Result<User>;
    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionInfo>;
    /// Identity behind the active session; `Error::Auth` when there is none.
    async fn get_account(&self) -> Result<User>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    // Documents
    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList>;
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
        permissions: &[Permission],
    ) -> Result<Document>;
    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()>;
}
