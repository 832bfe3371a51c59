//! Integration tests for the auth session against a mock API

use auth_session::{AuthError, AuthState, Credentials, Registration, SessionManager};
use api_transport::ApiClient;
use client_config::{Config, ServicePaths};
use mockito::{Matcher, Server, ServerGuard};
use parking_lot::Mutex;
use serde_json::{json, Value};
use session_storage::{create_memory_session_store, create_session_store, SessionStore};
use std::sync::Arc;

const PROFILE: &str = r#"{
    "id": 7,
    "email": "a@b.com",
    "profile": { "id": 3, "user_id": 7, "full_name": "Ada", "avatar": "", "gender": true }
}"#;

struct Harness {
    store: Arc<SessionStore>,
    session: Arc<SessionManager>,
}

fn harness(server: &ServerGuard, store: SessionStore) -> Harness {
    let config = Config {
        api_base_url: server.url(),
        ..Config::default()
    };
    let client = Arc::new(ApiClient::new(&config).expect("client"));
    let store = Arc::new(store);
    let session = SessionManager::from_config(client, store.clone(), &config);
    Harness { store, session }
}

fn record_states(session: &SessionManager) -> Arc<Mutex<Vec<AuthState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    session.set_state_callback(Box::new(move |payload| sink.lock().push(payload.state)));
    states
}

#[tokio::test]
async fn initialize_without_token_signs_out_without_fetching() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .expect(0)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());
    assert!(h.session.is_loading());

    //* When
    let state = h.session.initialize().await.expect("initialize");

    //* Then
    profile.assert_async().await;
    assert_eq!(state, AuthState::SignedOut);
    assert!(!h.session.is_loading());
    assert!(!h.session.is_signed_in());
    assert!(h.session.client().interceptor().is_none());
}

#[tokio::test]
async fn initialize_with_valid_token_signs_in() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);
    let states = record_states(&h.session);

    //* When
    let state = h.session.initialize().await.expect("initialize");

    //* Then
    profile.assert_async().await;
    assert_eq!(state, AuthState::SignedIn);
    assert_eq!(h.session.cached_token().as_deref(), Some("T1"));
    assert_eq!(h.session.auth_user().map(|u| u.id), Some(7));
    assert!(h.session.client().interceptor().is_some());
    assert_eq!(*states.lock(), vec![AuthState::SignedIn]);
}

#[tokio::test]
async fn initialize_with_rejected_token_purges_it() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .with_status(401)
        .with_body(r#"{"detail":"Could not validate credentials"}"#)
        .expect(1)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("STALE").unwrap();
    let h = harness(&server, store);

    //* When
    let state = h.session.initialize().await.expect("initialize");

    //* Then
    profile.assert_async().await;
    assert_eq!(state, AuthState::SignedOut);
    assert!(!h.store.has_auth_token().unwrap());
    assert!(h.session.cached_token().is_none());
    assert!(h.session.client().interceptor().is_none());
}

#[tokio::test]
async fn sign_in_stores_token_without_fetching_profile() {
    //* Given
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/login")
        .match_body(Matcher::Json(json!({ "email": "a@b.com", "password": "x" })))
        .with_status(200)
        .with_body(r#"{"access_token":"T1","token_type":"bearer"}"#)
        .expect(1)
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/profile")
        .expect(0)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());
    h.session.initialize().await.expect("initialize");

    //* When
    let state = h
        .session
        .sign_in(&Credentials::new("a@b.com", "x"))
        .await
        .expect("sign in");

    //* Then
    login.assert_async().await;
    profile.assert_async().await;
    assert_eq!(state, AuthState::SignedIn);
    assert_eq!(h.store.get_auth_token().unwrap().as_deref(), Some("T1"));
    assert_eq!(h.session.cached_token().as_deref(), Some("T1"));
    assert!(h.session.auth_user().is_none());
    assert!(h.session.client().interceptor().is_some());
}

#[tokio::test]
async fn sign_in_rejected_is_invalid_credentials() {
    //* Given
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/login")
        .with_status(401)
        .with_body(r#"{"detail":"Incorrect email or password"}"#)
        .expect(1)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());
    h.session.initialize().await.expect("initialize");

    //* When
    let result = h.session.sign_in(&Credentials::new("a@b.com", "wrong")).await;

    //* Then
    login.assert_async().await;
    match result {
        Err(AuthError::InvalidCredentials(reason)) => {
            assert_eq!(reason, "Incorrect email or password")
        }
        other => panic!("expected invalid credentials, got {:?}", other),
    }
    assert_eq!(h.session.state(), AuthState::SignedOut);
    assert!(!h.store.has_auth_token().unwrap());
}

#[tokio::test]
async fn sign_in_server_failure_is_api_error() {
    //* Given
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/login")
        .with_status(503)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());

    //* When
    let result = h.session.sign_in(&Credentials::new("a@b.com", "x")).await;

    //* Then
    let err = result.unwrap_err();
    assert!(matches!(err, AuthError::Api(_)), "got {:?}", err);
    assert!(err.is_transient());
    assert!(h.session.is_loading());
}

#[tokio::test]
async fn sign_up_registers_then_signs_in() {
    //* Given
    let mut server = Server::new_async().await;
    let register = server
        .mock("POST", "/register")
        .match_body(Matcher::Json(json!({
            "email": "new@b.com",
            "password": "pw",
            "full_name": "New User"
        })))
        .with_status(201)
        .with_body(r#"{"access_token":"T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());
    h.session.initialize().await.expect("initialize");

    //* When
    let state = h
        .session
        .sign_up(&Registration::new("new@b.com", "pw", "New User"))
        .await
        .expect("sign up");

    //* Then
    register.assert_async().await;
    assert_eq!(state, AuthState::SignedIn);
    assert_eq!(h.store.get_auth_token().unwrap().as_deref(), Some("T2"));
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    //* Given
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(r#"{"access_token":"T1"}"#)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());
    h.session.initialize().await.expect("initialize");
    h.session
        .sign_in(&Credentials::new("a@b.com", "x"))
        .await
        .expect("sign in");
    let states = record_states(&h.session);

    //* When
    let first = h.session.sign_out().expect("first sign out");
    let second = h.session.sign_out().expect("second sign out");

    //* Then
    assert_eq!(first, AuthState::SignedOut);
    assert_eq!(second, AuthState::SignedOut);
    assert!(!h.store.has_auth_token().unwrap());
    assert!(h.session.cached_token().is_none());
    assert!(h.session.auth_user().is_none());
    assert!(h.session.client().interceptor().is_none());
    assert_eq!(*states.lock(), vec![AuthState::SignedOut]);
    assert!(matches!(
        h.session.require_signed_in(),
        Err(AuthError::NotSignedIn)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_401s_all_fail_and_sign_out() {
    //* Given
    let mut server = Server::new_async().await;
    let _profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .create_async()
        .await;
    let feed = server
        .mock("GET", "/posts")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"detail":"Token expired"}"#)
        .expect(3)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);
    assert_eq!(h.session.initialize().await.unwrap(), AuthState::SignedIn);
    let states = record_states(&h.session);

    //* When
    let requests: Vec<_> = (0..3)
        .map(|offset| {
            let client = h.session.client().clone();
            tokio::spawn(async move {
                client
                    .get_with_params::<Value, _>("/posts", &json!({ "limit": 10, "offset": offset }))
                    .await
            })
        })
        .collect();

    //* Then
    for request in requests {
        let err = request.await.unwrap().unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
    feed.assert_async().await;
    assert_eq!(h.session.state(), AuthState::SignedOut);
    assert!(!h.store.has_auth_token().unwrap());
    assert!(h.session.client().interceptor().is_none());
    assert_eq!(states.lock().first(), Some(&AuthState::SignedOut));
}

#[tokio::test]
async fn fetch_user_profile_falls_back_to_store() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);
    assert!(h.session.cached_token().is_none());

    //* When
    let user = h.session.fetch_user_profile().await.expect("fetch");

    //* Then
    profile.assert_async().await;
    let user = user.expect("profile loaded");
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.profile.full_name.as_deref(), Some("Ada"));
    assert_eq!(h.session.cached_token().as_deref(), Some("T1"));
    assert_eq!(h.session.auth_user(), Some(user));
}

#[tokio::test]
async fn fetch_user_profile_without_token_is_noop() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .expect(0)
        .create_async()
        .await;
    let h = harness(&server, create_memory_session_store());

    //* When
    let user = h.session.fetch_user_profile().await.expect("fetch");

    //* Then
    profile.assert_async().await;
    assert!(user.is_none());
}

#[tokio::test]
async fn fetch_user_profile_surfaces_failure() {
    //* Given
    let mut server = Server::new_async().await;
    let _profile = server
        .mock("GET", "/profile")
        .with_status(500)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);

    //* When
    let result = h.session.fetch_user_profile().await;

    //* Then
    assert!(matches!(result, Err(AuthError::Api(e)) if e.status() == Some(500)));
    assert!(h.session.auth_user().is_none());
}

#[tokio::test]
async fn users_path_prefix_is_applied() {
    //* Given
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/users/login")
        .with_status(200)
        .with_body(r#"{"access_token":"T1"}"#)
        .expect(1)
        .create_async()
        .await;
    let config = Config {
        api_base_url: server.url(),
        services: ServicePaths {
            users: "/users/".to_string(),
            ..ServicePaths::default()
        },
        recovery_wait_timeout_secs: 1,
        ..Config::default()
    };
    let client = Arc::new(ApiClient::new(&config).unwrap());
    let session =
        SessionManager::from_config(client, Arc::new(create_memory_session_store()), &config);

    //* When
    session
        .sign_in(&Credentials::new("a@b.com", "x"))
        .await
        .expect("sign in");

    //* Then
    login.assert_async().await;
    assert!(session.is_signed_in());
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    //* Given
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(r#"{"access_token":"T1"}"#)
        .create_async()
        .await;
    let _profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .create_async()
        .await;

    let first = harness(&server, create_session_store(&path).unwrap());
    first.session.initialize().await.unwrap();
    first
        .session
        .sign_in(&Credentials::new("a@b.com", "x"))
        .await
        .unwrap();
    drop(first);

    //* When
    let second = harness(&server, create_session_store(&path).unwrap());
    let state = second.session.initialize().await.unwrap();

    //* Then
    assert_eq!(state, AuthState::SignedIn);
    assert_eq!(second.session.auth_user().map(|u| u.id), Some(7));
}

/// Accept one request, report its `authorization` header, then answer 401
/// once released.
async fn held_unauthorized_endpoint() -> (
    String,
    tokio::sync::oneshot::Receiver<String>,
    tokio::sync::oneshot::Sender<()>,
) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let url = format!("http://{}/slow", listener.local_addr().expect("addr"));
    let (arrived_tx, arrived_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.expect("read");
        let head = String::from_utf8_lossy(&buf[..n]).to_string();
        let auth = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("authorization")
                    .then(|| value.trim().to_string())
            })
            .unwrap_or_default();
        let _ = arrived_tx.send(auth);
        let _ = release_rx.await;
        let body = r#"{"detail":"Token expired"}"#;
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    (url, arrived_rx, release_tx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_401_from_ended_session_keeps_new_session() {
    //* Given
    let mut server = Server::new_async().await;
    let _profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .create_async()
        .await;
    let _login = server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(r#"{"access_token":"T2"}"#)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);
    assert_eq!(h.session.initialize().await.unwrap(), AuthState::SignedIn);

    let (slow_url, arrived, release) = held_unauthorized_endpoint().await;
    let client = h.session.client().clone();
    let in_flight = tokio::spawn(async move { client.get::<Value>(&slow_url).await });
    assert_eq!(arrived.await.unwrap(), "Bearer T1");

    //* When
    h.session.sign_out().unwrap();
    h.session
        .sign_in(&Credentials::new("a@b.com", "x"))
        .await
        .expect("sign in");
    release.send(()).unwrap();
    let result = in_flight.await.unwrap();

    //* Then
    assert_eq!(result.unwrap_err().status(), Some(401));
    assert_eq!(h.session.state(), AuthState::SignedIn);
    assert_eq!(h.session.cached_token().as_deref(), Some("T2"));
    assert_eq!(h.store.get_auth_token().unwrap().as_deref(), Some("T2"));
    assert!(h.session.client().interceptor().is_some());
}

#[tokio::test]
async fn initialize_offline_keeps_stored_token() {
    //* Given
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = Config {
        api_base_url: format!("http://{}", addr),
        ..Config::default()
    };
    let client = Arc::new(ApiClient::new(&config).unwrap());
    let store = Arc::new(create_memory_session_store());
    store.set_auth_token("T1").unwrap();
    let session = SessionManager::from_config(client, store.clone(), &config);

    //* When
    let result = session.initialize().await;

    //* Then
    let err = result.unwrap_err();
    assert!(err.is_transient(), "got {:?}", err);
    assert_eq!(session.state(), AuthState::SignedOut);
    assert!(session.cached_token().is_none());
    assert!(session.client().interceptor().is_none());
    assert_eq!(store.get_auth_token().unwrap().as_deref(), Some("T1"));
}

#[tokio::test]
async fn initialize_server_error_keeps_stored_token() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);

    //* When
    let result = h.session.initialize().await;

    //* Then
    profile.assert_async().await;
    assert!(matches!(result, Err(AuthError::Api(_))));
    assert_eq!(h.session.state(), AuthState::SignedOut);
    assert_eq!(h.store.get_auth_token().unwrap().as_deref(), Some("T1"));
}

#[tokio::test]
async fn initialize_twice_is_rejected_without_side_effects() {
    //* Given
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/profile")
        .match_header("authorization", "Bearer T1")
        .with_status(200)
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;
    let store = create_memory_session_store();
    store.set_auth_token("T1").unwrap();
    let h = harness(&server, store);
    h.session.initialize().await.unwrap();
    let interceptor = h.session.client().interceptor().expect("interceptor");

    //* When
    let result = h.session.initialize().await;

    //* Then
    profile.assert_async().await;
    assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));
    assert_eq!(h.session.state(), AuthState::SignedIn);
    assert_eq!(h.session.cached_token().as_deref(), Some("T1"));
    assert!(Arc::ptr_eq(
        &interceptor,
        &h.session.client().interceptor().expect("interceptor")
    ));
}
