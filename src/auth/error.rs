use std::fmt;

use thiserror::Error;

/// Failure reported by (or while talking to) the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The endpoint answered with a non-2xx status; `body` is the raw error payload.
    Status { status: u16, body: String },
    /// DNS, connect, TLS or timeout failure before a response arrived.
    Network(String),
    /// A 2xx response whose body was not a usable token record.
    InvalidResponse(String),
    /// The current record carries no refresh token, so nothing was sent.
    MissingRefreshToken,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "status {status}: {body}"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid response: {message}"),
            Self::MissingRefreshToken => f.write_str("no refresh token on the current record"),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

/// Errors raised by the OAuth2 token lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated: connect WHOOP first")]
    Unauthenticated,
    #[error("No authorization code received")]
    MissingCode,
    #[error("Invalid state")]
    StateMismatch,
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(ProviderError),
    #[error("Token refresh failed: {0}")]
    RefreshFailed(ProviderError),
    #[error("Invalid OAuth configuration: {0}")]
    Configuration(String),
    #[error("Credential storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// The provider's error payload, when the failure came from the token endpoint.
    pub fn provider_body(&self) -> Option<&str> {
        match self {
            Self::ExchangeFailed(ProviderError::Status { body, .. })
            | Self::RefreshFailed(ProviderError::Status { body, .. }) => Some(body),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
