use alexios_server::dispatch::{replies, Dispatcher, DispatcherSettings};
use alexios_server::{app, AppState};
use alexios_store::{MemoryStore, MessageStore, SqliteStore, StoreError, StoreResult};
use alexios_types::{Message, MessageSummary, NewMessage, SkillResponse};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn router_with(store: Arc<dyn MessageStore>) -> Router {
    let dispatcher = Dispatcher::new(
        store,
        DispatcherSettings::default(),
        tracing::Span::none(),
    );
    app(AppState { dispatcher })
}

fn envelope(user_id: &str, command: &str, new: bool, timezone: &str) -> Value {
    json!({
        "request": {"type": "SimpleUtterance", "command": command},
        "session": {"new": new, "user": {"user_id": user_id}},
        "timezone": timezone
    })
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .uri("/")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn call(router: &Router, body: Value) -> (StatusCode, Option<SkillResponse>) {
    let response = router
        .clone()
        .oneshot(post(body.to_string()))
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if status == StatusCode::OK {
        (status, Some(serde_json::from_slice(&bytes).unwrap()))
    } else {
        assert!(bytes.is_empty(), "error responses carry no body");
        (status, None)
    }
}

async fn say(router: &Router, user_id: &str, command: &str) -> String {
    let (status, reply) = call(router, envelope(user_id, command, false, "")).await;
    assert_eq!(status, StatusCode::OK, "command {command:?}");
    reply.unwrap().response.text
}

#[tokio::test]
async fn sign_up_end_to_end() {
    let router = router_with(Arc::new(MemoryStore::new()));

    let (status, reply) = call(&router, envelope("u1", "Sign Up John", true, "UTC")).await;
    assert_eq!(status, StatusCode::OK);
    let reply = reply.unwrap();
    assert_eq!(
        reply.response.text,
        "You have successfully been registered as John"
    );
    assert_eq!(reply.version, "1.0");

    let (status, reply) = call(&router, envelope("u2", "Sign Up John", true, "UTC")).await;
    assert_eq!(status, StatusCode::OK, "a taken name is not a server error");
    assert_eq!(reply.unwrap().response.text, replies::NAME_TAKEN);
}

#[tokio::test]
async fn concurrent_sign_ups_yield_one_winner() {
    let router = router_with(Arc::new(MemoryStore::new()));

    let a = tokio::spawn({
        let router = router.clone();
        async move { call(&router, envelope("u1", "Sign Up John", false, "")).await }
    });
    let b = tokio::spawn({
        let router = router.clone();
        async move { call(&router, envelope("u2", "Sign Up John", false, "")).await }
    });

    let mut texts = Vec::new();
    for handle in [a, b] {
        let (status, reply) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        texts.push(reply.unwrap().response.text);
    }
    texts.sort();
    assert_eq!(
        texts,
        vec![
            replies::NAME_TAKEN.to_string(),
            "You have successfully been registered as John".to_string(),
        ]
    );
}

#[tokio::test]
async fn full_conversation_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("webhook.db");
    let store = SqliteStore::open(path.to_str().unwrap(), Default::default()).unwrap();
    let router = router_with(Arc::new(store));

    assert_eq!(
        say(&router, "bob-id", "Sign Up Bob").await,
        "You have successfully been registered as Bob"
    );
    assert_eq!(say(&router, "bob-id", "Anything new?").await, replies::NO_NEW_MESSAGES);

    assert_eq!(
        say(&router, "alice-id", "Send Bob See you at 5, okay?").await,
        replies::MESSAGE_SENT
    );
    assert_eq!(
        say(&router, "alice-id", "Send Bob Second note").await,
        replies::MESSAGE_SENT
    );
    assert_eq!(say(&router, "bob-id", "Anything new?").await, "There are 2 new messages.");

    let first = say(&router, "bob-id", "Read 1").await;
    assert!(first.starts_with("Message from alice-id, sent at "), "{first}");
    assert!(first.ends_with(": See you at 5, okay?"), "{first}");

    // Reading does not remove; the same position yields the same message.
    assert_eq!(say(&router, "bob-id", "Read 1").await, first);
    assert!(say(&router, "bob-id", "Read 2").await.ends_with(": Second note"));

    for n in 3..=6 {
        assert_eq!(
            say(&router, "bob-id", &format!("Read {n}")).await,
            replies::NO_SUCH_MESSAGE
        );
    }
}

#[tokio::test]
async fn send_to_unknown_user_is_spoken() {
    let router = router_with(Arc::new(MemoryStore::new()));
    assert_eq!(
        say(&router, "u1", "Send Nobody hi").await,
        "There is no user named Nobody."
    );
}

#[tokio::test]
async fn wrong_method_is_405() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let response = router.oneshot(post("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_content_type_still_decodes() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let request = Request::builder()
        .uri("/")
        .method("POST")
        .body(Body::from(envelope("u1", "hello", false, "").to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unsupported_type_is_422() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let mut body = envelope("u1", "Read 1", false, "");
    body["request"]["type"] = json!("ButtonPressed");
    let (status, _) = call(&router, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bad_timezone_on_new_session_is_400() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let (status, reply) = call(&router, envelope("u1", "hello", true, "Not/AZone")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply.is_none());
}

#[tokio::test]
async fn new_session_status_includes_time() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let (status, reply) = call(&router, envelope("u1", "hello", true, "Asia/Tokyo")).await;
    assert_eq!(status, StatusCode::OK);
    let text = reply.unwrap().response.text;
    assert!(text.starts_with("Exact time "), "{text}");
    assert!(text.ends_with(replies::NO_NEW_MESSAGES), "{text}");
}

struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn resolve_user(&self, _username: &str) -> StoreResult<String> {
        Ok("u2".to_string())
    }
    async fn list_mailbox(&self, _identity: &str) -> StoreResult<Vec<MessageSummary>> {
        Ok(vec![MessageSummary {
            id: 1,
            sender: "u2".to_string(),
            sent_at: Utc::now(),
        }])
    }
    async fn get_message(&self, id: i64) -> StoreResult<Message> {
        Err(StoreError::NotFound(format!("message {id}")))
    }
    async fn append_message(&self, _recipient: &str, _message: NewMessage) -> StoreResult<i64> {
        Err(StoreError::Task("disk on fire".to_string()))
    }
    async fn register_user(&self, _identity: &str, _username: &str) -> StoreResult<()> {
        Err(StoreError::Poisoned)
    }
    async fn purge_messages_before(&self, _cutoff: DateTime<Utc>) -> StoreResult<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn store_failures_are_500_without_details() {
    let router = router_with(Arc::new(FailingStore));
    for command in ["Send Bob hi", "Read 1", "Sign Up John"] {
        let (status, reply) = call(&router, envelope("u1", command, false, "")).await;
        assert_eq!(
            status,
            StatusCode::INTERNAL_SERVER_ERROR,
            "command {command:?}"
        );
        assert!(reply.is_none());
    }
}

#[tokio::test]
async fn health_check_returns_ok() {
    let router = router_with(Arc::new(MemoryStore::new()));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
