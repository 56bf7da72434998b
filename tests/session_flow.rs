// Integration tests for the session lifecycle
//
// These drive the public API end to end: two-step login, transparent refresh
// on an expired access token, session teardown, and logout.

use mockito::Matcher;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::Arc;

use authgate::auth::{LoginFlow, LoginOutcome};
use authgate::client::SessionClient;
use authgate::error::AuthError;
use authgate::nav;
use authgate::store::{MemoryStore, Slot, TokenStore};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

struct Harness {
    store: Arc<dyn TokenStore>,
    session: SessionClient,
    flow: LoginFlow,
}

fn harness(server: &mockito::Server) -> Harness {
    let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::new());
    let session = SessionClient::with_client(Client::new(), store.clone(), server.url());
    let flow = LoginFlow::new(Client::new(), server.url(), store.clone());
    Harness {
        store,
        session,
        flow,
    }
}

async fn fetch_welcome(session: &SessionClient) -> Result<reqwest::Response, AuthError> {
    let request = session
        .client()
        .get(session.url("/api/welcome/"))
        .build()
        .unwrap();
    session.send(request).await
}

// ==================================================================================================
// Two-Step Login
// ==================================================================================================

#[tokio::test]
async fn test_full_second_factor_login_then_protected_request() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/api/login/")
        .match_body(Matcher::Json(json!({"username": "ana", "password": "pw"})))
        .with_status(200)
        .with_body(
            r#"{"requires_mfa": true, "temp_token": "T1", "user_id": 9, "timestamp": 1700000000}"#,
        )
        .create_async()
        .await;
    server
        .mock("POST", "/api/mfa/verify/")
        .match_body(Matcher::Json(json!({
            "token": "123456",
            "temp_token": "T1",
            "user_id": "9",
            "timestamp": "1700000000"
        })))
        .with_status(200)
        .with_body(r#"{"access": "A1", "refresh": "R1"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/welcome/")
        .match_header("authorization", "Bearer A1")
        .with_status(200)
        .with_body(r#"{"message": "Welcome back"}"#)
        .create_async()
        .await;

    let h = harness(&server);

    // Step 1: guard keeps us out, login stores the handshake triple
    assert_eq!(
        nav::resolve(nav::HOME, h.store.as_ref()).unwrap(),
        nav::Access::Redirect(nav::LOGIN)
    );
    let outcome = h.flow.login("ana", "pw").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::SecondFactorRequired { .. }));
    assert!(!h.store.is_authenticated().unwrap());

    // Step 2: code exchange establishes the session
    h.flow.verify_code("123456").await.unwrap();
    assert!(h.store.is_authenticated().unwrap());
    assert_eq!(
        nav::resolve(nav::HOME, h.store.as_ref()).unwrap(),
        nav::Access::Allow
    );

    // Protected request carries the fresh access token
    let response = fetch_welcome(&h.session).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ==================================================================================================
// Transparent Refresh
// ==================================================================================================

#[tokio::test]
async fn test_expired_access_token_is_refreshed_mid_session() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/api/welcome/")
        .match_header("authorization", "Bearer A1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .match_body(Matcher::Json(json!({"refresh": "R1"})))
        .with_status(200)
        .with_body(r#"{"access": "A2"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/api/welcome/")
        .match_header("authorization", "Bearer A2")
        .with_status(200)
        .with_body(r#"{"message": "Welcome back"}"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server);
    h.store.set_tokens("A1", "R1").unwrap();

    // Caller sees only the final, successful response
    let response = fetch_welcome(&h.session).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(h.store.get_access_token().unwrap().as_deref(), Some("A2"));
    assert_eq!(h.store.get_refresh_token().unwrap().as_deref(), Some("R1"));
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_irrecoverable_refresh_forces_reauthentication() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/api/welcome/")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/token/refresh/")
        .with_status(401)
        .with_body(r#"{"detail": "Token is invalid or expired"}"#)
        .create_async()
        .await;

    let h = harness(&server);
    h.store.set_tokens("A1", "R1").unwrap();
    h.store.set_temp_token("T1", "9", "1700000000").unwrap();

    let err = fetch_welcome(&h.session).await.unwrap_err();
    match err {
        AuthError::SessionExpired { redirect_to } => assert_eq!(redirect_to, nav::LOGIN),
        other => panic!("unexpected error: {other}"),
    }

    // Full wipe, and the guard sends us back to the login entry point
    for slot in Slot::ALL {
        assert_eq!(h.store.get(slot).unwrap(), None);
    }
    assert_eq!(
        nav::resolve(nav::HOME, h.store.as_ref()).unwrap(),
        nav::Access::Redirect(nav::LOGIN)
    );
}

// ==================================================================================================
// Logout
// ==================================================================================================

#[tokio::test]
async fn test_logout_then_requests_carry_no_credential() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/api/logout/")
        .match_header("authorization", "Bearer A1")
        .with_status(200)
        .with_body(r#"{"message": "Logged out successfully"}"#)
        .create_async()
        .await;
    let bare = server
        .mock("GET", "/api/welcome/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server);
    h.store.set_tokens("A1", "R1").unwrap();

    h.flow.logout(&h.session).await.unwrap();
    assert!(!h.store.is_authenticated().unwrap());

    // After the wipe, requests go out unmodified
    let response = fetch_welcome(&h.session).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    bare.assert_async().await;
}
