//! WHOOP developer API endpoints used by the coach.

use serde_json::Value;

use crate::client::{AuthenticatedClient, RequestError};

pub const RECOVERY_PATH: &str = "/developer/v2/recovery";
pub const LATEST_SLEEP_PATH: &str = "/developer/v1/activity/sleep?limit=1";
pub const WORKOUTS_PATH: &str = "/developer/v1/activity/workout";
pub const BODY_MEASUREMENT_PATH: &str = "/developer/v1/user/body_measurement";
pub const CYCLES_PATH: &str = "/developer/v1/cycles";

/// Data resources exposed by [`WhoopApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Recovery,
    LatestSleep,
    Workouts,
    BodyMeasurement,
    Cycles,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Self::Recovery => RECOVERY_PATH,
            Self::LatestSleep => LATEST_SLEEP_PATH,
            Self::Workouts => WORKOUTS_PATH,
            Self::BodyMeasurement => BODY_MEASUREMENT_PATH,
            Self::Cycles => CYCLES_PATH,
        }
    }
}

/// Payloads are passed through untouched; the provider's schema is not modelled here.
#[derive(Clone)]
pub struct WhoopApi {
    client: AuthenticatedClient,
    base_url: String,
}

impl WhoopApi {
    pub fn new(client: AuthenticatedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch(&self, resource: Resource) -> Result<Value, RequestError> {
        self.client.get(&self.url(resource)).await
    }

    pub async fn recovery(&self) -> Result<Value, RequestError> {
        self.fetch(Resource::Recovery).await
    }

    pub async fn latest_sleep(&self) -> Result<Value, RequestError> {
        self.fetch(Resource::LatestSleep).await
    }

    pub async fn workouts(&self) -> Result<Value, RequestError> {
        self.fetch(Resource::Workouts).await
    }

    pub async fn body_measurement(&self) -> Result<Value, RequestError> {
        self.fetch(Resource::BodyMeasurement).await
    }

    pub async fn cycles(&self) -> Result<Value, RequestError> {
        self.fetch(Resource::Cycles).await
    }

    fn url(&self, resource: Resource) -> String {
        format!("{}{}", self.base_url, resource.path())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{MemoryCredentialStore, TokenEndpoint, TokenManager};

    fn api(base: &str) -> WhoopApi {
        let tokens = TokenManager::new(
            Arc::new(MemoryCredentialStore::new()),
            TokenEndpoint::new("http://127.0.0.1:9/token", "id", "secret"),
        );
        WhoopApi::new(AuthenticatedClient::new(Arc::new(tokens)), base)
    }

    #[test]
    fn urls_join_base_and_resource_path() {
        let api = api("https://api.prod.whoop.com/");
        assert_eq!(api.base_url(), "https://api.prod.whoop.com");
        assert_eq!(
            api.url(Resource::Recovery),
            "https://api.prod.whoop.com/developer/v2/recovery"
        );
        assert_eq!(
            api.url(Resource::LatestSleep),
            "https://api.prod.whoop.com/developer/v1/activity/sleep?limit=1"
        );
    }

    #[tokio::test]
    async fn fetch_without_credentials_is_unauthenticated() {
        let err = api("http://127.0.0.1:9").recovery().await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Auth(crate::auth::AuthError::Unauthenticated)
        ));
    }
}
