//! HTTP client for an Appwrite-compatible backend.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::{
    Backend, Document, DocumentList, Permission, Query, SessionInfo, User, validate_id,
};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

const PROJECT_HEADER: &str = "x-appwrite-project";
const RESPONSE_FORMAT_HEADER: &str = "x-appwrite-response-format";
const RESPONSE_FORMAT: &str = "1.5.0";

/// REST client for the backend.
///
/// The session cookie issued by `create_email_password_session` is kept in
/// the client's cookie jar, so clones of one client share one session.
///
/// # Example
///
/// ```rust,no_run
/// use idea_board::backend::{AppwriteClient, Backend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AppwriteClient::new("https://cloud.appwrite.io/v1", "my-project")?;
/// client.create_email_password_session("me@example.com", "secret").await?;
/// let me = client.get_account().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppwriteClient {
    base_url: Url,
    http: reqwest::Client,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ServiceError {
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
}

impl AppwriteClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The API root (e.g., "https://cloud.appwrite.io/v1")
    /// * `project_id` - Project the requests are scoped to
    pub fn new(endpoint: impl AsRef<str>, project_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            PROJECT_HEADER,
            HeaderValue::from_str(project_id)
                .map_err(|e| Error::Config(format!("invalid project id: {e}")))?,
        );
        headers.insert(
            RESPONSE_FORMAT_HEADER,
            HeaderValue::from_static(RESPONSE_FORMAT),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;
        Self::with_client(endpoint, http)
    }

    /// Create a new client with a custom reqwest client.
    ///
    /// The caller is responsible for the project header and the cookie jar.
    pub fn with_client(endpoint: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        // Exactly one trailing slash; `url` pops the empty segment before appending.
        let base = format!("{}/", endpoint.as_ref().trim_end_matches('/'));
        let base_url = Url::parse(&base)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("endpoint cannot be a base: {base_url}")));
        }
        Ok(Self { base_url, http })
    }

    /// Build a client from the `backend` configuration section.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.endpoint, &config.project_id)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Append `segments` to the base path. Each segment is percent-encoded
    /// as a whole, so `/`, `?` and `#` inside an id never change the route.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("endpoint cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of a collection's documents, or of one document in it.
    fn documents_url(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: Option<&str>,
    ) -> Result<Url> {
        validate_id("database", database_id)?;
        validate_id("collection", collection_id)?;
        let mut segments = vec![
            "databases",
            database_id,
            "collections",
            collection_id,
            "documents",
        ];
        if let Some(document_id) = document_id {
            validate_id("document", document_id)?;
            segments.push(document_id);
        }
        self.url(&segments)
    }

    fn session_url(&self, session_id: &str) -> Result<Url> {
        validate_id("session", session_id)?;
        self.url(&["account", "sessions", session_id])
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        let message = match serde_json::from_str::<ServiceError>(&body) {
            Ok(err) if err.kind.is_empty() => err.message,
            Ok(err) => format!("{} ({})", err.message, err.kind),
            Err(_) => body,
        };
        Err(Error::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl Backend for AppwriteClient {
    #[instrument(skip(self, password), fields(user_id = %user_id))]
    async fn create_account(&self, user_id: &str, email: &str, password: &str) -> Result<User> {
        let body = json!({ "userId": user_id, "email": email, "password": password });
        let response = self
            .http
            .post(self.url(&["account"])?)
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self, password))]
    async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionInfo> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .http
            .post(self.url(&["account", "sessions", "email"])?)
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self))]
    async fn get_account(&self) -> Result<User> {
        let response = self.http.get(self.url(&["account"])?).send().await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.session_url(session_id)?)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, queries), fields(query_count = queries.len()))]
    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_string()))
            .collect();
        let response = self
            .http
            .get(self.documents_url(database_id, collection_id, None)?)
            .query(&params)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self, data, permissions))]
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Value,
        permissions: &[Permission],
    ) -> Result<Document> {
        validate_id("document", document_id)?;
        let permissions: Vec<String> = permissions.iter().map(ToString::to_string).collect();
        let body = json!({
            "documentId": document_id,
            "data": data,
            "permissions": permissions,
        });
        let response = self
            .http
            .post(self.documents_url(database_id, collection_id, None)?)
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    #[instrument(skip(self))]
    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let url = self.documents_url(database_id, collection_id, Some(document_id))?;
        let response = self.http.delete(url).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
