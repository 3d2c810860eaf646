//! Process configuration, read from the environment (and `.env` when present).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;

use crate::auth::{FileCredentialStore, OAuthConfig, RefreshPolicy, TokenManager};
use crate::client::AuthenticatedClient;
use crate::coach::OpenAiCoach;
use crate::error::{CoachError, Result};
use crate::whoop::WhoopApi;

pub const DEFAULT_WHOOP_HOSTNAME: &str = "https://api.prod.whoop.com";
pub const DEFAULT_SCOPES: &str =
    "offline read:recovery read:sleep read:workout read:profile read:body_measurement read:cycles";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Everything the binary needs to wire the components together.
#[derive(Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    /// Base for both the OAuth endpoints and the developer API.
    pub whoop_hostname: String,
    pub scopes: Vec<String>,
    pub token_file: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub bind_addr: String,
    pub refresh_policy: RefreshPolicy,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("callback_url", &self.callback_url)
            .field("whoop_hostname", &self.whoop_hostname)
            .field("scopes", &self.scopes)
            .field("token_file", &self.token_file)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| ".."))
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("bind_addr", &self.bind_addr)
            .field("refresh_policy", &self.refresh_policy)
            .finish()
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // a missing .env is fine
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| CoachError::Configuration(format!("{key} is not set")))
        };

        let refresh_policy = match get("PROACTIVE_REFRESH_SKEW_SECS") {
            Some(raw) => {
                let secs: i64 = raw.trim().parse().map_err(|_| {
                    CoachError::Configuration(format!(
                        "PROACTIVE_REFRESH_SKEW_SECS must be a whole number of seconds, got {raw:?}"
                    ))
                })?;
                RefreshPolicy::Proactive {
                    skew: Duration::seconds(secs.clamp(0, 86_400)),
                }
            }
            None => RefreshPolicy::Reactive,
        };

        Ok(Self {
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            callback_url: required("CALLBACK_URL")?,
            whoop_hostname: get("WHOOP_API_HOSTNAME")
                .unwrap_or_else(|| DEFAULT_WHOOP_HOSTNAME.to_string())
                .trim_end_matches('/')
                .to_string(),
            scopes: get("WHOOP_SCOPES")
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string())
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            token_file: get("TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(FileCredentialStore::default_path),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            refresh_policy,
        })
    }

    pub fn oauth(&self) -> OAuthConfig {
        OAuthConfig::for_hostname(
            &self.whoop_hostname,
            &self.client_id,
            &self.client_secret,
            &self.callback_url,
            self.scopes.clone(),
        )
    }

    pub fn credential_store(&self) -> FileCredentialStore {
        FileCredentialStore::new(&self.token_file)
    }

    /// Token manager seeded from the configured token file.
    pub fn token_manager(&self) -> Result<TokenManager> {
        let store = Arc::new(self.credential_store());
        let manager = TokenManager::load(store, self.oauth().token_endpoint())?;
        Ok(manager.with_refresh_policy(self.refresh_policy))
    }

    pub fn whoop_api(&self, tokens: Arc<TokenManager>) -> WhoopApi {
        WhoopApi::new(AuthenticatedClient::new(tokens), &self.whoop_hostname)
    }

    /// `None` when no OpenAI key is configured.
    pub fn coach(&self) -> Option<OpenAiCoach> {
        self.openai_api_key.as_ref().map(|key| {
            OpenAiCoach::new(key)
                .with_base_url(&self.openai_base_url)
                .with_model(&self.openai_model)
        })
    }
}
