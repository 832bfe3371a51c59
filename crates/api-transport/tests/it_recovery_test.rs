//! Integration tests for 401 recovery through the client

use api_transport::{
    ApiClient, ApiError, ApiResult, AuthInterceptor, RecoveryHandler, RecoveryOutcome,
};
use async_trait::async_trait;
use client_config::Config;
use mockito::Server;
use serde_json::Value;
use session_storage::{create_memory_session_store, SessionStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Clears the stored token once released, like a forced sign-out.
struct SignOutHandler {
    store: Arc<SessionStore>,
    calls: AtomicUsize,
    gate: Option<Notify>,
}

#[async_trait]
impl RecoveryHandler for SignOutHandler {
    async fn recover(&self, _trigger: &ApiError) -> ApiResult<RecoveryOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.store.clear_auth_token()?;
        Ok(RecoveryOutcome::SignedOut)
    }
}

/// Swaps in a fresh token.
struct RefreshHandler {
    store: Arc<SessionStore>,
    calls: AtomicUsize,
}

#[async_trait]
impl RecoveryHandler for RefreshHandler {
    async fn recover(&self, _trigger: &ApiError) -> ApiResult<RecoveryOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.store.set_auth_token("NEW")?;
        Ok(RecoveryOutcome::Refreshed("NEW".to_string()))
    }
}

fn client_for(base_url: String) -> Arc<ApiClient> {
    let config = Config {
        api_base_url: base_url,
        ..Config::default()
    };
    Arc::new(ApiClient::new(&config).expect("client"))
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_401s_share_one_sign_out() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body(r#"{"detail":"Token expired"}"#)
        .expect(3)
        .create_async()
        .await;

    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("T1").unwrap();
    let handler = Arc::new(SignOutHandler {
        store: store.clone(),
        calls: AtomicUsize::new(0),
        gate: Some(Notify::new()),
    });
    let interceptor = Arc::new(AuthInterceptor::new(
        store.clone(),
        handler.clone(),
        Duration::from_secs(5),
    ));
    let client = client_for(server.url());
    client.attach_interceptor(interceptor.clone());

    //* When
    let requests: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get::<Value>("/profile").await })
        })
        .collect();

    wait_until(|| interceptor.pending_len() == 2).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    handler.gate.as_ref().unwrap().notify_one();

    //* Then
    for request in requests {
        let err = request.await.unwrap().unwrap_err();
        assert!(err.is_unauthorized(), "got {:?}", err);
    }
    mock.assert_async().await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert!(!store.has_auth_token().unwrap());
    assert!(!interceptor.is_recovering());
}

#[tokio::test]
async fn refreshed_token_replays_request_once() {
    //* Given
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer OLD")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let fresh = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer NEW")
        .with_status(200)
        .with_body(r#"{"id":1}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("OLD").unwrap();
    let handler = Arc::new(RefreshHandler {
        store: store.clone(),
        calls: AtomicUsize::new(0),
    });
    let client = client_for(server.url());
    client.attach_interceptor(Arc::new(AuthInterceptor::new(
        store.clone(),
        handler.clone(),
        Duration::from_secs(5),
    )));

    //* When
    let profile: Value = client.get("/profile").await.expect("replayed request");

    //* Then
    stale.assert_async().await;
    fresh.assert_async().await;
    assert_eq!(profile["id"], 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_401_after_replay_propagates() {
    //* Given
    let mut server = Server::new_async().await;
    let stale = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer OLD")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let still_rejected = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer NEW")
        .with_status(401)
        .with_body("nope")
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("OLD").unwrap();
    let handler = Arc::new(RefreshHandler {
        store: store.clone(),
        calls: AtomicUsize::new(0),
    });
    let client = client_for(server.url());
    client.attach_interceptor(Arc::new(AuthInterceptor::new(
        store,
        handler.clone(),
        Duration::from_secs(5),
    )));

    //* When
    let result: Result<Value, _> = client.get("/profile").await;

    //* Then
    stale.assert_async().await;
    still_rejected.assert_async().await;
    assert_eq!(
        result,
        Err(ApiError::HttpStatus {
            status: 401,
            body: "nope".to_string()
        })
    );
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn other_failures_skip_recovery() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/profile")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("T1").unwrap();
    let handler = Arc::new(SignOutHandler {
        store: store.clone(),
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let client = client_for(server.url());
    client.attach_interceptor(Arc::new(AuthInterceptor::new(
        store.clone(),
        handler.clone(),
        Duration::from_secs(5),
    )));

    //* When
    let result: Result<Value, _> = client.get("/profile").await;

    //* Then
    mock.assert_async().await;
    assert_eq!(result.unwrap_err().status(), Some(500));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert!(store.has_auth_token().unwrap());
}

#[tokio::test]
async fn multipart_request_carries_token_but_no_json_type() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/posts")
        .match_header("authorization", "Bearer T1")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("T1").unwrap();
    let client = client_for(server.url());
    client.attach_interceptor(Arc::new(AuthInterceptor::new(
        store.clone(),
        Arc::new(SignOutHandler {
            store,
            calls: AtomicUsize::new(0),
            gate: None,
        }),
        Duration::from_secs(5),
    )));

    //* When
    let form = api_transport::MultipartPayload::new().text("title", "hi");
    let _: Value = client.post_form_data("/posts", form).await.expect("upload");

    //* Then
    mock.assert_async().await;
}
