//! Error types for whoop-coach.

use thiserror::Error;

use crate::auth::AuthError;
use crate::client::{RequestError, TransportError};

/// Primary error type for application-level operations.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Summary service error (status {status}): {message}")]
    Summary { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoachError {
    pub fn summary(status: u16, message: impl Into<String>) -> Self {
        Self::Summary {
            status,
            message: message.into(),
        }
    }

    /// Whether the user has to (re)connect the provider account to get past this error.
    pub fn needs_authorization(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Unauthenticated)
                | Self::Request(RequestError::Auth(AuthError::Unauthenticated))
        )
    }

    /// Provider response body carried by this error, if any.
    pub fn provider_body(&self) -> Option<&str> {
        match self {
            Self::Auth(err) | Self::Request(RequestError::Auth(err)) => err.provider_body(),
            Self::Request(RequestError::Transport(TransportError::Status { body, .. })) => {
                Some(body)
            }
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CoachError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderError;

    #[test]
    fn unauthenticated_is_detected_through_request_errors() {
        assert!(CoachError::from(AuthError::Unauthenticated).needs_authorization());
        assert!(
            CoachError::from(RequestError::Auth(AuthError::Unauthenticated)).needs_authorization()
        );
        assert!(!CoachError::from(AuthError::StateMismatch).needs_authorization());
    }

    #[test]
    fn provider_body_surfaces_refresh_and_transport_payloads() {
        let refresh = CoachError::from(RequestError::Auth(AuthError::RefreshFailed(
            ProviderError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            },
        )));
        assert_eq!(refresh.provider_body(), Some("invalid_grant"));

        let transport = CoachError::from(RequestError::Transport(TransportError::Status {
            status: 500,
            body: "upstream".to_string(),
        }));
        assert_eq!(transport.provider_body(), Some("upstream"));
        assert_eq!(CoachError::Configuration("x".into()).provider_body(), None);
    }
}
