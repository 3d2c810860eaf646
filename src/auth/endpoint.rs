use tracing::debug;

use super::error::ProviderError;
use super::token::TokenRecord;

/// Form-encoded client for the provider's OAuth2 token endpoint.
///
/// Shared by [`AuthorizationFlow`](super::AuthorizationFlow) for the `authorization_code`
/// grant and by [`TokenManager`](super::TokenManager) for the `refresh_token` grant.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenEndpoint {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenRecord, ProviderError> {
        debug!(token_url = %self.token_url, "Exchanging authorization code");
        self.post_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, ProviderError> {
        debug!(token_url = %self.token_url, "Requesting refresh_token grant");
        self.post_grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    async fn post_grant(&self, params: &[(&str, &str)]) -> Result<TokenRecord, ProviderError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| ProviderError::InvalidResponse(err.to_string()))
    }
}
