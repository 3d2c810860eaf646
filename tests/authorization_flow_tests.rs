mod auth_support;

use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use reqwest::Url;
use serde_json::json;
use whoop_coach::auth::{
    AuthError, AuthorizationFlow, CredentialStore, FileCredentialStore, ProviderError, TokenRecord,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{manager, oauth_config, token_json, TOKEN_PATH};

#[tokio::test]
async fn authorization_url_targets_provider_with_state() {
    let server = MockServer::start().await;
    let flow = AuthorizationFlow::new(oauth_config(&server));

    let request = flow.begin_authorization().expect("begin");
    let url = Url::parse(&request.url).unwrap();
    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

    assert_eq!(url.path(), "/oauth/oauth2/auth");
    assert_eq!(params["scope"], "offline read:recovery");
    assert_eq!(params["state"], request.state);
}

#[tokio::test]
async fn callback_exchanges_code_and_seeds_manager() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=code-123"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A1", "R1")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path().join("tokens.json")));
    let tokens = manager(&server, store.clone());
    let flow = AuthorizationFlow::new(oauth_config(&server));

    let request = flow.begin_authorization().unwrap();
    let record = flow
        .complete_authorization(Some("code-123"), Some(request.state.as_str()))
        .await
        .expect("exchange");
    tokens.seed(record).await.expect("seed");

    let expected: TokenRecord = serde_json::from_value(token_json("A1", "R1")).unwrap();
    assert!(tokens.has_credentials().await);
    assert_eq!(tokens.current_access_token().await.unwrap(), "A1");
    assert_eq!(store.load().unwrap(), Some(expected));
}

#[tokio::test]
async fn wrong_state_never_reaches_the_token_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A1", "R1")))
        .expect(0)
        .mount(&server)
        .await;

    let flow = AuthorizationFlow::new(oauth_config(&server));
    flow.begin_authorization().unwrap();

    let err = flow
        .complete_authorization(Some("code-123"), Some("forged"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));

    let err = flow
        .complete_authorization(Some("code-123"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn rejected_exchange_leaves_manager_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path().join("tokens.json")));
    let tokens = manager(&server, store.clone());
    let flow = AuthorizationFlow::new(oauth_config(&server));
    let request = flow.begin_authorization().unwrap();

    let err = flow
        .complete_authorization(Some("bad-code"), Some(request.state.as_str()))
        .await
        .unwrap_err();

    match err {
        AuthError::ExchangeFailed(ProviderError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected ExchangeFailed, got {other:?}"),
    }
    assert!(!tokens.has_credentials().await);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn exchange_with_unparsable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let flow = AuthorizationFlow::new(oauth_config(&server));
    let request = flow.begin_authorization().unwrap();
    let err = flow
        .complete_authorization(Some("code"), Some(request.state.as_str()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::ExchangeFailed(ProviderError::InvalidResponse(_))
    ));
}
