//! Bearer-authenticated GET requests with one-shot 401 recovery.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, TokenManager};

/// A request reached the provider (or tried to) and did not produce a usable body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Could not decode provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

/// Everything [`AuthenticatedClient::get`] can fail with.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RequestError {
    /// HTTP status of a provider rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Outbound GET executor bound to a [`TokenManager`].
///
/// Every call attaches the current access token. A 401 triggers exactly one refresh and
/// exactly one retry; the retry's outcome is returned as-is, even if it is another 401.
/// A proactive refresh made for the same call counts as that one refresh, so a 401 after it
/// is returned directly. Other failures are surfaced without touching the credentials.
///
/// A refresh whose new record could not be persisted still counts as a refresh: the retry
/// goes out with the new token and the storage error is only logged.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
}

impl AuthenticatedClient {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub async fn get(&self, url: &str) -> Result<Value, RequestError> {
        let token = self.tokens.access_token_for_request().await?;

        match self.send(url, &token.access_token).await {
            Err(TransportError::Status { status, body })
                if status == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                if token.refresh_attempted {
                    warn!(%url, "Rejected right after a refresh, not refreshing again");
                    return Err(TransportError::Status { status, body }.into());
                }
                info!(%url, "Token expired, refreshing");
                match self
                    .tokens
                    .refresh_after_unauthorized(&token.access_token)
                    .await
                {
                    Ok(()) => {}
                    Err(AuthError::Storage(err)) => {
                        warn!(%url, error = %err, "Refreshed token not persisted, retrying with it");
                    }
                    Err(err) => return Err(err.into()),
                }
                let retry_token = self.tokens.current_access_token().await?;
                let outcome = self.send(url, &retry_token).await;
                if let Err(err) = &outcome {
                    warn!(%url, error = %err, "Retry after refresh failed");
                }
                Ok(outcome?)
            }
            outcome => Ok(outcome?),
        }
    }

    /// [`AuthenticatedClient::get`] decoded into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RequestError> {
        let value = self.get(url).await?;
        serde_json::from_value(value)
            .map_err(|err| RequestError::Transport(TransportError::Decode(err.to_string())))
    }

    async fn send(&self, url: &str, token: &str) -> Result<Value, TransportError> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| TransportError::Decode(err.to_string()))
    }
}
