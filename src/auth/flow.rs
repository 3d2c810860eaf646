use std::sync::Mutex;

use rand::RngCore;
use reqwest::Url;
use tracing::{info, warn};

use super::endpoint::TokenEndpoint;
use super::error::AuthError;
use super::token::TokenRecord;

const STATE_BYTES: usize = 16;

/// Client registration and endpoints for the three-legged flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Endpoints under `{hostname}/oauth/oauth2/`.
    pub fn for_hostname(
        hostname: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        let base = hostname.trim_end_matches('/');
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: format!("{base}/oauth/oauth2/auth"),
            token_url: format!("{base}/oauth/oauth2/token"),
            scopes,
        }
    }

    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint::new(&self.token_url, &self.client_id, &self.client_secret)
    }
}

/// Where to send the browser, and the state value it must come back with.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Drives the authorization-code exchange.
///
/// Holds a single pending state slot: beginning a new authorization replaces the previous
/// state, so only the most recent browser round trip can complete.
///
/// # Example
/// ```no_run
/// use whoop_coach::auth::{AuthorizationFlow, OAuthConfig};
///
/// # async fn example() -> Result<(), whoop_coach::auth::AuthError> {
/// let config = OAuthConfig::for_hostname(
///     "https://api.prod.whoop.com",
///     "client-id",
///     "client-secret",
///     "http://localhost:3000/callback",
///     vec!["offline".into(), "read:recovery".into()],
/// );
/// let flow = AuthorizationFlow::new(config);
/// let request = flow.begin_authorization()?;
/// println!("open {}", request.url);
/// let record = flow
///     .complete_authorization(Some("code-from-callback"), Some(request.state.as_str()))
///     .await?;
/// # let _ = record;
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationFlow {
    config: OAuthConfig,
    endpoint: TokenEndpoint,
    pending_state: Mutex<Option<String>>,
}

impl AuthorizationFlow {
    pub fn new(config: OAuthConfig) -> Self {
        let endpoint = config.token_endpoint();
        Self {
            config,
            endpoint,
            pending_state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Generate a fresh state token, record it as pending and build the authorization URL.
    pub fn begin_authorization(&self) -> Result<AuthorizationRequest, AuthError> {
        let state = generate_state();
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|err| AuthError::Configuration(format!("authorize URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state);

        *self.pending_slot()? = Some(state.clone());
        info!("Authorization started, redirecting to provider");
        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Validate the callback and exchange the code for a token record.
    ///
    /// The pending state is consumed by the first callback that presents a code, whether or
    /// not the state matches. The returned record is not installed anywhere; hand it to
    /// [`TokenManager::seed`](super::TokenManager::seed).
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<TokenRecord, AuthError> {
        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let pending = self.pending_slot()?.take();
        match (pending, state) {
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => {
                warn!("Authorization callback rejected: state mismatch");
                return Err(AuthError::StateMismatch);
            }
        }

        let record = self
            .endpoint
            .exchange_code(code, &self.config.redirect_uri)
            .await
            .map_err(|err| {
                warn!(error = %err, "Token exchange failed");
                AuthError::ExchangeFailed(err)
            })?;
        info!("Authorization code exchanged");
        Ok(record)
    }

    /// Whether an authorization is waiting for its callback.
    pub fn has_pending(&self) -> bool {
        self.pending_state
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn pending_slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, AuthError> {
        self.pending_state
            .lock()
            .map_err(|_| AuthError::Storage("pending state lock poisoned".to_string()))
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
