//! In-process backend.
//!
//! Keeps accounts, a single client session and documents in memory and
//! enforces document permissions the way the hosted service does. Used by
//! the test suite and by `idea-board shell --offline`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    Action, Backend, CREATED_AT, Document, DocumentList, Permission, Query, SessionInfo, User,
    unique_id,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    // email -> account
    accounts: HashMap<String, Account>,
    // (session_id, user_id) of the one client this backend serves
    session: Option<(String, String)>,
    // (database_id, collection_id) -> documents in insertion order
    collections: HashMap<(String, String), Vec<Document>>,
    last_timestamp: Option<DateTime<Utc>>,
    offline: bool,
}

impl MemoryState {
    fn principal(&self) -> Option<&str> {
        self.session.as_ref().map(|(_, user_id)| user_id.as_str())
    }

    /// Strictly increasing clock so `$createdAt` ordering is total.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::from_status(503, "service unavailable"));
        }
        Ok(())
    }
}

fn allows(doc: &Document, action: Action, principal: Option<&str>) -> bool {
    doc.permissions
        .iter()
        .filter_map(|p| p.parse::<Permission>().ok())
        .any(|p| p.action == action && p.role.admits(principal))
}

fn sort_key(doc: &Document, attribute: &str) -> Value {
    if attribute == CREATED_AT {
        Value::String(doc.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
    } else {
        doc.data.get(attribute).cloned().unwrap_or(Value::Null)
    }
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        _ => std::cmp::Ordering::Equal,
    }
}

/// In-memory [`Backend`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a transport error (or recover).
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Number of documents stored in a collection, ignoring permissions.
    pub async fn document_count(&self, database_id: &str, collection_id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .collections
            .get(&(database_id.to_string(), collection_id.to_string()))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_account(&self, user_id: &str, email: &str, password: &str) -> Result<User> {
        let mut state = self.state.lock().await;
        state.check_online()?;

        if email.trim().is_empty() || !email.contains('@') {
            return Err(Error::validation("Invalid `email` param (general_argument_invalid)"));
        }
        if password.len() < 8 {
            return Err(Error::validation(
                "Invalid `password` param: must be at least 8 characters (general_argument_invalid)",
            ));
        }
        if state.accounts.contains_key(email)
            || state.accounts.values().any(|a| a.user.id == user_id)
        {
            return Err(Error::from_status(
                409,
                "A user with the same id, email, or phone already exists (user_already_exists)",
            ));
        }

        let created_at = state.tick();
        let user = User {
            id: user_id.to_string(),
            email: email.to_string(),
            name: String::new(),
            email_verification: false,
            created_at: Some(created_at),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Ok(user)
    }

    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionInfo> {
        let mut state = self.state.lock().await;
        state.check_online()?;

        if state.session.is_some() {
            return Err(Error::from_status(
                401,
                "Creation of a session is prohibited when a session is active (user_session_already_exists)",
            ));
        }
        let user_id = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.id.clone(),
            _ => {
                return Err(Error::auth(
                    "Invalid credentials. Please check the email and password (user_invalid_credentials)",
                ));
            }
        };

        let session_id = unique_id();
        let expire = (state.tick() + Duration::days(365)).to_rfc3339();
        state.session = Some((session_id.clone(), user_id.clone()));
        Ok(SessionInfo {
            id: session_id,
            user_id,
            expire,
            provider: "email".to_string(),
        })
    }

    async fn get_account(&self) -> Result<User> {
        let state = self.state.lock().await;
        state.check_online()?;

        let user_id = state.principal().ok_or_else(|| {
            Error::auth("User (role: guests) missing scope (account) (general_unauthorized_scope)")
        })?;
        state
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| Error::auth("User not found (user_not_found)"))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_online()?;

        let addressed = state
            .session
            .as_ref()
            .map(|(id, _)| session_id == super::CURRENT_SESSION || session_id == id);
        match addressed {
            Some(true) => {
                state.session = None;
                Ok(())
            }
            Some(false) => Err(Error::validation("Session not found (user_session_not_found)")),
            None => Err(Error::auth(
                "User (role: guests) missing scope (account) (general_unauthorized_scope)",
            )),
        }
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList> {
        let state = self.state.lock().await;
        state.check_online()?;

        let principal = state.principal();
        let mut documents: Vec<Document> = state
            .collections
            .get(&(database_id.to_string(), collection_id.to_string()))
            .map(|docs| {
                docs.iter()
                    .filter(|d| allows(d, Action::Read, principal))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for query in queries {
            match query {
                Query::Equal(attr, values) => {
                    documents.retain(|d| values.contains(&sort_key(d, attr)));
                }
                Query::OrderDesc(attr) => {
                    documents.sort_by(|a, b| compare(&sort_key(b, attr), &sort_key(a, attr)));
                }
                Query::OrderAsc(attr) => {
                    documents.sort_by(|a, b| compare(&sort_key(a, attr), &sort_key(b, attr)));
                }
                Query::Limit(_) | Query::Offset(_) => {}
            }
        }

        let total = documents.len() as u64;
        let offset = queries.iter().rev().find_map(|q| match q {
            Query::Offset(n) => Some(*n),
            _ => None,
        });
        let limit = queries.iter().rev().find_map(|q| match q {
            Query::Limit(n) => Some(*n),
            _ => None,
        });
        let documents = documents
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(25))
            .collect();

        Ok(DocumentList { total, documents })
    }

    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
        permissions: &[Permission],
    ) -> Result<Document> {
        let mut state = self.state.lock().await;
        state.check_online()?;

        if state.principal().is_none() {
            return Err(Error::auth(
                "The current user is not authorized to perform the requested action (user_unauthorized)",
            ));
        }
        let Value::Object(data) = data else {
            return Err(Error::validation(
                "Invalid document structure: expected an object (document_invalid_structure)",
            ));
        };

        let key = (database_id.to_string(), collection_id.to_string());
        if state
            .collections
            .get(&key)
            .is_some_and(|docs| docs.iter().any(|d| d.id == document_id))
        {
            return Err(Error::from_status(
                409,
                "Document with the requested ID already exists (document_already_exists)",
            ));
        }

        let now = state.tick();
        let doc = Document {
            id: document_id.to_string(),
            created_at: now,
            updated_at: now,
            permissions: permissions.iter().map(ToString::to_string).collect(),
            data,
        };
        state.collections.entry(key).or_default().push(doc.clone());
        Ok(doc)
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_online()?;

        let principal = state.principal().map(str::to_string);
        let docs = state
            .collections
            .get_mut(&(database_id.to_string(), collection_id.to_string()))
            .ok_or_else(|| {
                Error::from_status(
                    404,
                    "Collection with the requested ID could not be found (collection_not_found)",
                )
            })?;
        let idx = docs
            .iter()
            .position(|d| d.id == document_id)
            .ok_or_else(|| {
                Error::from_status(
                    404,
                    "Document with the requested ID could not be found (document_not_found)",
                )
            })?;

        if !allows(&docs[idx], Action::Delete, principal.as_deref()) {
            return Err(Error::auth(
                "The current user is not authorized to perform the requested action (user_unauthorized)",
            ));
        }
        docs.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CURRENT_SESSION, Role};
    use crate::error::ErrorKind;
    use serde_json::json;

    async fn signed_in(email: &str) -> (MemoryBackend, String) {
        let backend = MemoryBackend::new();
        let user = backend
            .create_account(&unique_id(), email, "password123")
            .await
            .unwrap();
        backend
            .create_email_password_session(email, "password123")
            .await
            .unwrap();
        (backend, user.id)
    }

    fn owned_by(user_id: &str) -> Vec<Permission> {
        vec![
            Permission::read(Role::Any),
            Permission::update(Role::User(user_id.to_string())),
            Permission::delete(Role::User(user_id.to_string())),
        ]
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.get_account().await.unwrap_err().kind(),
            ErrorKind::AuthFailure
        );

        backend
            .create_account("u1", "a@x.com", "password123")
            .await
            .unwrap();
        let dup = backend
            .create_account("u2", "a@x.com", "password123")
            .await
            .unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::ValidationFailure);

        let bad = backend
            .create_email_password_session("a@x.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(bad.kind(), ErrorKind::AuthFailure);

        backend
            .create_email_password_session("a@x.com", "password123")
            .await
            .unwrap();
        assert_eq!(backend.get_account().await.unwrap().id, "u1");

        backend.delete_session(CURRENT_SESSION).await.unwrap();
        assert!(backend.get_account().await.is_err());
    }

    #[tokio::test]
    async fn test_list_orders_and_limits() {
        let (backend, user_id) = signed_in("a@x.com").await;
        for i in 0..5 {
            backend
                .create_document(
                    "db",
                    "ideas",
                    &format!("d{i}"),
                    json!({ "n": i }),
                    &owned_by(&user_id),
                )
                .await
                .unwrap();
        }

        let list = backend
            .list_documents("db", "ideas", &[Query::order_desc(CREATED_AT), Query::limit(3)])
            .await
            .unwrap();
        assert_eq!(list.total, 5);
        let ids: Vec<_> = list.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["d4", "d3", "d2"]);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let (backend, user_id) = signed_in("a@x.com").await;
        for (i, tag) in ["x", "y", "x", "x", "y"].into_iter().enumerate() {
            backend
                .create_document(
                    "db",
                    "ideas",
                    &format!("d{i}"),
                    json!({ "n": i, "tag": tag }),
                    &owned_by(&user_id),
                )
                .await
                .unwrap();
        }

        let list = backend
            .list_documents(
                "db",
                "ideas",
                &[
                    Query::equal("tag", "x"),
                    Query::order_asc("n"),
                    Query::offset(1),
                    Query::limit(5),
                ],
            )
            .await
            .unwrap();
        assert_eq!(list.total, 3);
        let ids: Vec<_> = list.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["d2", "d3"]);

        let wire = Query::equal("tag", "x").to_value();
        assert_eq!(
            wire,
            json!({ "method": "equal", "attribute": "tag", "values": ["x"] })
        );
        assert_eq!(
            Query::offset(20).to_value(),
            json!({ "method": "offset", "values": [20] })
        );
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let (backend, owner) = signed_in("owner@x.com").await;
        backend
            .create_document("db", "ideas", "d1", json!({}), &owned_by(&owner))
            .await
            .unwrap();
        backend.delete_session(CURRENT_SESSION).await.unwrap();

        backend
            .create_account("other", "other@x.com", "password123")
            .await
            .unwrap();
        backend
            .create_email_password_session("other@x.com", "password123")
            .await
            .unwrap();

        let err = backend.delete_document("db", "ideas", "d1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthFailure);
        assert_eq!(backend.document_count("db", "ideas").await, 1);

        let missing = backend.delete_document("db", "ideas", "nope").await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::ValidationFailure);
    }

    #[tokio::test]
    async fn test_offline_fails_as_transport() {
        let (backend, _) = signed_in("a@x.com").await;
        backend.set_offline(true).await;
        let err = backend.list_documents("db", "ideas", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }
}
