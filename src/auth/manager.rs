//! Token lifecycle: the single authority for which access token to use right now.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::endpoint::TokenEndpoint;
use super::error::{AuthError, ProviderError};
use super::store::CredentialStore;
use super::token::TokenRecord;

// Ten years; keeps deadline arithmetic far from chrono's limits.
const MAX_LIFETIME_SECS: i64 = 315_360_000;

/// When the manager mints a new access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Only after the provider answers 401. `expires_in` is ignored.
    #[default]
    Reactive,
    /// Also before a request once `expires_in` (minus `skew`) has elapsed since issue.
    Proactive { skew: Duration },
}

/// Access token for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub access_token: String,
    /// Obtaining this token already went to the token endpoint, whatever the outcome.
    pub refresh_attempted: bool,
}

#[derive(Debug, Clone)]
struct Credentials {
    record: TokenRecord,
    issued_at: DateTime<Utc>,
}

impl Credentials {
    fn fresh(record: TokenRecord) -> Self {
        Self {
            record,
            issued_at: Utc::now(),
        }
    }

    fn is_stale(&self, skew: Duration, now: DateTime<Utc>) -> bool {
        match self.record.lifetime_secs() {
            Some(secs) => {
                let secs = i64::try_from(secs)
                    .unwrap_or(i64::MAX)
                    .min(MAX_LIFETIME_SECS);
                self.issued_at
                    .checked_add_signed(Duration::seconds(secs) - skew)
                    .is_some_and(|deadline| deadline <= now)
            }
            None => false,
        }
    }
}

/// Owns the in-memory token record, refreshes it and persists every change.
///
/// Starts either empty (`NoCredentials`) or from the store; once seeded it never goes back.
/// A failed refresh leaves the previous, possibly stale, record in place.
///
/// Refreshes are serialized behind a lock. [`TokenManager::refresh_after_unauthorized`]
/// skips the provider call when another caller already replaced the rejected token, so
/// simultaneous 401s cost a single refresh.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use whoop_coach::auth::{FileCredentialStore, TokenEndpoint, TokenManager};
///
/// # async fn example() -> Result<(), whoop_coach::auth::AuthError> {
/// let store = Arc::new(FileCredentialStore::new("whoopTokens.json"));
/// let endpoint = TokenEndpoint::new(
///     "https://api.prod.whoop.com/oauth/oauth2/token",
///     "client-id",
///     "client-secret",
/// );
/// let manager = TokenManager::load(store, endpoint)?;
/// let token = manager.current_access_token().await?;
/// # let _ = token;
/// # Ok(())
/// # }
/// ```
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    endpoint: TokenEndpoint,
    policy: RefreshPolicy,
    current: RwLock<Option<Credentials>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Manager with no credentials; nothing is read from `store`.
    pub fn new(store: Arc<dyn CredentialStore>, endpoint: TokenEndpoint) -> Self {
        Self {
            store,
            endpoint,
            policy: RefreshPolicy::Reactive,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Manager seeded from whatever `store` holds (load-on-start).
    pub fn load(store: Arc<dyn CredentialStore>, endpoint: TokenEndpoint) -> Result<Self, AuthError> {
        let current = match store.load_with_timestamp()? {
            Some((record, saved_at)) => Some(Credentials {
                record,
                issued_at: saved_at.unwrap_or_else(Utc::now),
            }),
            None => {
                debug!("No stored credentials; starting unauthenticated");
                None
            }
        };
        Ok(Self {
            store,
            endpoint,
            policy: RefreshPolicy::Reactive,
            current: RwLock::new(current),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Install `record` as current and persist it.
    ///
    /// The record is installed even when the write fails; the storage error is still returned
    /// and the token is lost on restart.
    pub async fn seed(&self, record: TokenRecord) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.install(record).await?;
        info!("Credentials seeded");
        Ok(())
    }

    pub async fn current_access_token(&self) -> Result<String, AuthError> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|credentials| credentials.record.access_token.clone())
            .ok_or(AuthError::Unauthenticated)
    }

    /// Copy of the current record, if any.
    pub async fn snapshot(&self) -> Option<TokenRecord> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|credentials| credentials.record.clone())
    }

    pub async fn has_credentials(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Mint a new access token with the stored refresh token.
    ///
    /// A provider or network failure leaves the current record untouched. `Err(Storage)` is
    /// different: the provider's new record is already current and only the write failed.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh in response to a 401 on `rejected_token`.
    ///
    /// Returns without contacting the provider when the current token is no longer
    /// `rejected_token`, because a concurrent caller has already refreshed it.
    pub async fn refresh_after_unauthorized(&self, rejected_token: &str) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.current_access_token().await?;
        if current != rejected_token {
            debug!("Token already refreshed by a concurrent request");
            return Ok(());
        }
        self.refresh_locked().await
    }

    /// Access token to attach to the next request.
    ///
    /// Under [`RefreshPolicy::Proactive`] a stale token is refreshed first; if that refresh
    /// fails the existing token is returned and the provider gets to decide. Either way
    /// `refresh_attempted` is set, and the caller must not refresh again for this request.
    pub async fn access_token_for_request(&self) -> Result<RequestToken, AuthError> {
        let mut refresh_attempted = false;
        if let RefreshPolicy::Proactive { skew } = self.policy {
            if self.is_stale(skew).await? {
                let _guard = self.refresh_lock.lock().await;
                if self.is_stale(skew).await? {
                    debug!("Access token past its advisory lifetime, refreshing");
                    refresh_attempted = true;
                    match self.refresh_locked().await {
                        Ok(()) => {}
                        Err(AuthError::Storage(err)) => {
                            warn!(error = %err, "Refreshed token could not be persisted");
                        }
                        Err(err) => {
                            warn!(error = %err, "Proactive refresh failed, using existing token");
                        }
                    }
                }
            }
        }
        Ok(RequestToken {
            access_token: self.current_access_token().await?,
            refresh_attempted,
        })
    }

    async fn is_stale(&self, skew: Duration) -> Result<bool, AuthError> {
        let now = Utc::now();
        self.current
            .read()
            .await
            .as_ref()
            .map(|credentials| credentials.is_stale(skew, now))
            .ok_or(AuthError::Unauthenticated)
    }

    // Caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<(), AuthError> {
        let refresh_token = {
            let current = self.current.read().await;
            let credentials = current.as_ref().ok_or(AuthError::Unauthenticated)?;
            credentials.record.refresh_token.clone()
        };
        let refresh_token =
            refresh_token.ok_or(AuthError::RefreshFailed(ProviderError::MissingRefreshToken))?;

        let record = self.endpoint.refresh(&refresh_token).await.map_err(|err| {
            warn!(error = %err, "Refresh failed");
            AuthError::RefreshFailed(err)
        })?;
        self.install(record).await?;
        info!("Access token refreshed");
        Ok(())
    }

    async fn install(&self, record: TokenRecord) -> Result<(), AuthError> {
        let persisted = self.store.save(&record);
        *self.current.write().await = Some(Credentials::fresh(record));
        persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;

    fn manager(store: Arc<MemoryCredentialStore>) -> TokenManager {
        TokenManager::new(
            store,
            TokenEndpoint::new("http://127.0.0.1:9/oauth/oauth2/token", "id", "secret"),
        )
    }

    #[test]
    fn credentials_without_lifetime_never_go_stale() {
        let credentials = Credentials {
            record: TokenRecord::new("a", None),
            issued_at: Utc::now() - Duration::days(30),
        };
        assert!(!credentials.is_stale(Duration::zero(), Utc::now()));
    }

    #[test]
    fn staleness_honors_skew() {
        let issued_at = Utc::now();
        let credentials = Credentials {
            record: TokenRecord::new("a", None).with_expires_in(3600),
            issued_at,
        };
        let later = issued_at + Duration::minutes(56);
        assert!(!credentials.is_stale(Duration::zero(), later));
        assert!(credentials.is_stale(Duration::minutes(5), later));
        assert!(credentials.is_stale(Duration::zero(), issued_at + Duration::hours(1)));
    }

    #[tokio::test]
    async fn unauthenticated_until_seeded() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(store.clone());

        assert!(matches!(
            manager.current_access_token().await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(manager.refresh().await, Err(AuthError::Unauthenticated)));
        assert!(!manager.has_credentials().await);

        let record = TokenRecord::new("seeded", Some("r".to_string()));
        manager.seed(record.clone()).await.unwrap();

        assert_eq!(manager.current_access_token().await.unwrap(), "seeded");
        assert_eq!(store.get(), Some(record));
    }

    #[tokio::test]
    async fn load_picks_up_stored_record() {
        let record = TokenRecord::new("stored", Some("r".to_string()));
        let store = Arc::new(MemoryCredentialStore::with_record(record.clone()));
        let manager = TokenManager::load(
            store,
            TokenEndpoint::new("http://127.0.0.1:9/token", "id", "secret"),
        )
        .unwrap();
        assert_eq!(manager.snapshot().await, Some(record));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_locally() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(store);
        manager.seed(TokenRecord::new("a", None)).await.unwrap();

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::RefreshFailed(ProviderError::MissingRefreshToken)
        ));
        assert_eq!(manager.current_access_token().await.unwrap(), "a");
    }

    #[tokio::test]
    async fn unauthorized_refresh_is_skipped_when_token_already_rotated() {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(store);
        manager
            .seed(TokenRecord::new("new", Some("r".to_string())))
            .await
            .unwrap();

        // The endpoint is unreachable; success proves no request was attempted.
        manager.refresh_after_unauthorized("old").await.unwrap();
        assert_eq!(manager.current_access_token().await.unwrap(), "new");
    }
}
