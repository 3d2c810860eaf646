#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use whoop_coach::auth::{
    AuthError, CredentialStore, MemoryCredentialStore, OAuthConfig, TokenEndpoint, TokenManager,
    TokenRecord,
};
use whoop_coach::client::AuthenticatedClient;
use wiremock::MockServer;

pub const TOKEN_PATH: &str = "/oauth/oauth2/token";
pub const CALLBACK_URL: &str = "http://localhost:3000/callback";

/// Store whose writes always fail; loads see nothing.
#[derive(Default)]
pub struct FailingStore;

impl CredentialStore for FailingStore {
    fn load_with_timestamp(
        &self,
    ) -> Result<Option<(TokenRecord, Option<DateTime<Utc>>)>, AuthError> {
        Ok(None)
    }

    fn save(&self, _record: &TokenRecord) -> Result<(), AuthError> {
        Err(AuthError::Storage("disk full".to_string()))
    }
}

pub fn record(access_token: &str, refresh_token: Option<&str>) -> TokenRecord {
    TokenRecord::new(access_token, refresh_token.map(str::to_string))
}

/// Token endpoint body as the provider returns it.
pub fn token_json(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": 3600,
        "scope": "offline read:recovery",
        "token_type": "bearer"
    })
}

pub fn oauth_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig::for_hostname(
        &server.uri(),
        "client-1",
        "secret-1",
        CALLBACK_URL,
        vec!["offline".to_string(), "read:recovery".to_string()],
    )
}

pub fn endpoint(server: &MockServer) -> TokenEndpoint {
    TokenEndpoint::new(format!("{}{TOKEN_PATH}", server.uri()), "client-1", "secret-1")
}

pub fn manager(server: &MockServer, store: Arc<dyn CredentialStore>) -> TokenManager {
    TokenManager::new(store, endpoint(server))
}

/// Client over a manager already seeded with `seeded`, backed by a memory store.
pub async fn seeded_client(
    server: &MockServer,
    seeded: TokenRecord,
) -> (AuthenticatedClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let tokens = manager(server, store.clone());
    tokens.seed(seeded).await.expect("seed");
    (AuthenticatedClient::new(Arc::new(tokens)), store)
}
