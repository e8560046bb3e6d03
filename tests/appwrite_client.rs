//! HTTP-level tests for the service client against a mock server.

use std::sync::Arc;

use idea_board::ErrorKind;
use idea_board::backend::{AppwriteClient, Backend, CREATED_AT, Permission, Query, Role};
use idea_board::feed::{FeedSettings, IdeaFeedStore, IdeaInput};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PROJECT: &str = "proj";

async fn client(server: &MockServer) -> AppwriteClient {
    AppwriteClient::new(format!("{}/v1", server.uri()), PROJECT).expect("client")
}

fn user_body() -> Value {
    json!({
        "$id": "u1",
        "$createdAt": "2024-05-01T10:00:00.000+00:00",
        "email": "a@x.com",
        "name": "",
        "emailVerification": false
    })
}

fn document_body(id: &str, title: &str, created_at: &str) -> Value {
    json!({
        "$id": id,
        "$collectionId": "ideas",
        "$databaseId": "db",
        "$createdAt": created_at,
        "$updatedAt": created_at,
        "$permissions": ["read(\"any\")", "update(\"user:u1\")", "delete(\"user:u1\")"],
        "title": title,
        "description": "desc",
        "userId": "u1"
    })
}

fn error_body(message: &str, kind: &str) -> Value {
    json!({ "message": message, "code": 0, "type": kind, "version": "1.5.0" })
}

#[tokio::test]
async fn test_get_account_sends_project_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(header("x-appwrite-project", PROJECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(1)
        .mount(&server)
        .await;

    let user = client(&server).await.get_account().await.unwrap();

    assert_eq!(user.id, "u1");
    assert_eq!(user.email, "a@x.com");
}

#[tokio::test]
async fn test_get_account_without_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body(
            "User (role: guests) missing scope (account)",
            "general_unauthorized_scope",
        )))
        .mount(&server)
        .await;

    let err = client(&server).await.get_account().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthFailure);
    assert!(err.to_string().contains("general_unauthorized_scope"));
}

#[tokio::test]
async fn test_create_session_posts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/sessions/email"))
        .and(body_json(json!({ "email": "a@x.com", "password": "password123" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "$id": "s1",
            "userId": "u1",
            "expire": "2025-05-01T10:00:00.000+00:00",
            "provider": "email"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server)
        .await
        .create_email_password_session("a@x.com", "password123")
        .await
        .unwrap();

    assert_eq!(session.id, "s1");
    assert_eq!(session.user_id, "u1");
}

#[tokio::test]
async fn test_create_account_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account"))
        .and(body_partial_json(json!({ "userId": "new", "email": "a@x.com" })))
        .respond_with(ResponseTemplate::new(409).set_body_json(error_body(
            "A user with the same id, email, or phone already exists",
            "user_already_exists",
        )))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .create_account("new", "a@x.com", "password123")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_delete_current_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/account/sessions/current"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .delete_session(idea_board::backend::CURRENT_SESSION)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_sends_json_queries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/db/collections/ideas/documents"))
        .and(|req: &Request| {
            let queries: Vec<Value> = req
                .url
                .query_pairs()
                .filter(|(k, _)| k == "queries[]")
                .filter_map(|(_, v)| serde_json::from_str(&v).ok())
                .collect();
            queries
                == vec![
                    json!({ "method": "orderDesc", "attribute": "$createdAt" }),
                    json!({ "method": "limit", "values": [10] }),
                ]
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "documents": [document_body("d1", "A", "2024-05-01T10:00:00.000+00:00")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let list = client(&server)
        .await
        .list_documents(
            "db",
            "ideas",
            &[Query::order_desc(CREATED_AT), Query::limit(10)],
        )
        .await
        .unwrap();

    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].id, "d1");
    assert_eq!(list.documents[0].data["title"], "A");
}

#[tokio::test]
async fn test_create_document_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db/collections/ideas/documents"))
        .and(body_partial_json(json!({
            "documentId": "d1",
            "data": { "title": "A", "description": "desc", "userId": "u1" },
            "permissions": ["read(\"any\")", "delete(\"user:u1\")"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(document_body(
            "d1",
            "A",
            "2024-05-01T10:00:00.000+00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client(&server)
        .await
        .create_document(
            "db",
            "ideas",
            "d1",
            json!({ "title": "A", "description": "desc", "userId": "u1" }),
            &[
                Permission::read(Role::Any),
                Permission::delete(Role::User("u1".into())),
            ],
        )
        .await
        .unwrap();

    assert_eq!(doc.id, "d1");
    assert_eq!(doc.permissions.len(), 3);
}

#[tokio::test]
async fn test_delete_document_errors() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/databases/db/collections/ideas/documents/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(error_body(
            "Document with the requested ID could not be found.",
            "document_not_found",
        )))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/databases/db/collections/ideas/documents/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    let client = client(&server).await;

    let err = client
        .delete_document("db", "ideas", "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let err = client
        .delete_document("db", "ideas", "broken")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn test_document_id_cannot_leave_documents_route() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/account/sessions/current"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    let client = client(&server).await;

    let err = client
        .delete_document("db", "ideas", "../../../../../account/sessions/current")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let err = client.delete_document("db", "ideas", "..").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let err = client.delete_session("../sessions").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_feed_remove_with_hostile_id_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let backend: Arc<dyn Backend> = Arc::new(client(&server).await);
    let store = IdeaFeedStore::new(backend, FeedSettings::new("db", "ideas"));

    let err = store
        .remove("../../../../../account/sessions/current")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(store.snapshot().notice.is_some());
}

#[tokio::test]
async fn test_unreachable_service_is_transport_failure() {
    // Bind and drop a server so the port is closed.
    let uri = {
        let server = MockServer::builder().start().await;
        server.uri()
    };
    let client = AppwriteClient::new(format!("{uri}/v1"), PROJECT).unwrap();

    let err = client.get_account().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}

#[tokio::test]
async fn test_feed_store_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/databases/db/collections/ideas/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "documents": [
                document_body("d2", "B", "2024-05-02T10:00:00.000+00:00"),
                document_body("d1", "A", "2024-05-01T10:00:00.000+00:00"),
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db/collections/ideas/documents"))
        .and(body_partial_json(json!({ "data": { "title": "C" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(document_body(
            "d3",
            "C",
            "2024-05-03T10:00:00.000+00:00",
        )))
        .mount(&server)
        .await;

    let backend: Arc<dyn Backend> = Arc::new(client(&server).await);
    let store = IdeaFeedStore::new(backend, FeedSettings::new("db", "ideas"));

    let items = store.fetch().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "B");
    assert_eq!(items[0].user_id, "u1");
    assert_eq!(items[1].description, "desc");

    store.add(IdeaInput::new("C", "desc", "u1")).await.unwrap();
    let titles: Vec<String> = store.items().into_iter().map(|i| i.title).collect();
    assert_eq!(titles, vec!["C", "B", "A"]);
}
