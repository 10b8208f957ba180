//! HTTP-level tests for the protected page.

use std::sync::Arc;

use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use raven_auth::testing::{ResponseBuilder, TestSigner};
use raven_auth::{Authenticator, Keyring, RavenConfig, SessionGateway, RESPONSE_PARAM};
use raven_gateway::{create_router, GatewayConfig, GatewayState};
use raven_store::MemoryStore;
use url::Url;

const RETURN_URL: &str = "http://localhost:8080/";

fn server_with_keyring(keyring: Keyring) -> TestServer {
    let mut config = RavenConfig::new(Url::parse(RETURN_URL).unwrap());
    config.description = "Gateway tests".to_string();
    let auth = Authenticator::new(config, keyring);
    let sessions = SessionGateway::new(Arc::new(MemoryStore::new()));
    let state = GatewayState::new(auth, sessions, GatewayConfig::default());
    TestServer::new(create_router(state)).unwrap()
}

fn server() -> TestServer {
    server_with_keyring(TestSigner::fixture().keyring())
}

fn session_cookie(response: &TestResponse) -> HeaderValue {
    let set_cookie = response.header(SET_COOKIE);
    let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
    HeaderValue::from_str(&pair).unwrap()
}

fn redirect_nonce(response: &TestResponse) -> String {
    let location = Url::parse(response.header(LOCATION).to_str().unwrap()).unwrap();
    location
        .query_pairs()
        .find(|(key, _)| key == "params")
        .map(|(_, value)| value.into_owned())
        .unwrap()
}

#[tokio::test]
async fn health_reports_loaded_keys() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["key_ids"], serde_json::json!(["2"]));

    let response = server_with_keyring(Keyring::new()).get("/health").await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn first_visit_redirects_to_provider() {
    let response = server().get("/").add_query_param("page", "2").await;

    response.assert_status(StatusCode::FOUND);
    let location = response.header(LOCATION);
    let location = location.to_str().unwrap();
    assert!(location.starts_with("https://raven.cam.ac.uk/auth/authenticate.html?ver=1&"));
    assert!(location.contains("desc=Gateway+tests"));

    let cookie = response.header(SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("raven_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn signed_response_authenticates_and_restores_parameters() {
    let server = server();
    let signer = TestSigner::fixture();

    let first = server.get("/").add_query_param("page", "2").await;
    let cookie = session_cookie(&first);
    let nonce = redirect_nonce(&first);

    let raw = ResponseBuilder::success(RETURN_URL, "alice", &nonce, Utc::now()).sign(&signer);
    let back = server
        .get("/")
        .add_header(COOKIE, cookie.clone())
        .add_query_param(RESPONSE_PARAM, &raw)
        .await;

    back.assert_status_ok();
    let page = back.text();
    assert!(page.contains("succeeded with user: alice"));
    assert!(page.contains("<li>page = 2</li>"));
    assert!(back.headers().get(SET_COOKIE).is_none());

    // Cached on the next visit.
    let again = server.get("/").add_header(COOKIE, cookie).await;
    again.assert_status_ok();
    assert!(again.text().contains("alice"));
}

#[tokio::test]
async fn forged_response_is_refused() {
    let server = server();

    let first = server.get("/").await;
    let cookie = session_cookie(&first);
    let nonce = redirect_nonce(&first);

    let raw = ResponseBuilder::success(RETURN_URL, "alice", &nonce, Utc::now())
        .sign(&TestSigner::fixture())
        .replacen("!alice!", "!mallory!", 1);
    let back = server
        .get("/")
        .add_header(COOKIE, cookie)
        .add_query_param(RESPONSE_PARAM, &raw)
        .await;

    back.assert_status(StatusCode::FORBIDDEN);
    assert!(back.text().contains("failed with status: 560"));
}

#[tokio::test]
async fn logout_forces_new_round_trip() {
    let server = server();
    let signer = TestSigner::fixture();

    let first = server.get("/").await;
    let cookie = session_cookie(&first);
    let raw = ResponseBuilder::success(RETURN_URL, "alice", &redirect_nonce(&first), Utc::now())
        .sign(&signer);
    server
        .get("/")
        .add_header(COOKIE, cookie.clone())
        .add_query_param(RESPONSE_PARAM, &raw)
        .await
        .assert_status_ok();

    let after = server
        .get("/")
        .add_header(COOKIE, cookie)
        .add_query_param("logout", "logout")
        .await;
    after.assert_status(StatusCode::FOUND);
}

#[tokio::test]
async fn interact_skips_cached_session() {
    let server = server();
    let signer = TestSigner::fixture();

    let first = server.get("/").await;
    let cookie = session_cookie(&first);
    let raw = ResponseBuilder::success(RETURN_URL, "alice", &redirect_nonce(&first), Utc::now())
        .sign(&signer);
    server
        .get("/")
        .add_header(COOKIE, cookie.clone())
        .add_query_param(RESPONSE_PARAM, &raw)
        .await
        .assert_status_ok();

    let forced = server
        .get("/")
        .add_header(COOKIE, cookie)
        .add_query_param("interact", "interact")
        .await;
    forced.assert_status(StatusCode::FOUND);
    let location = forced.header(LOCATION);
    let location = location.to_str().unwrap();
    assert!(location.contains("iact=yes"));
    assert!(location.contains("msg=this+site+insists+you+interact+with+Raven"));
}

#[tokio::test]
async fn posted_form_parameters_survive_round_trip() {
    let server = server();
    let signer = TestSigner::fixture();

    let first = server.post("/").form(&[("page", "2")]).await;
    first.assert_status(StatusCode::FOUND);
    let cookie = session_cookie(&first);
    let nonce = redirect_nonce(&first);

    let raw = ResponseBuilder::success(RETURN_URL, "alice", &nonce, Utc::now()).sign(&signer);
    let back = server
        .get("/")
        .add_header(COOKIE, cookie)
        .add_query_param(RESPONSE_PARAM, &raw)
        .await;

    back.assert_status_ok();
    let page = back.text();
    assert!(page.contains("succeeded with user: alice"));
    assert!(page.contains("<li>page = 2</li>"));
}
