//! HTTP surface: browser-driven authorization plus JSON pass-through of WHOOP data.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::auth::{AuthError, AuthorizationFlow, TokenManager};
use crate::client::{RequestError, TransportError};
use crate::coach::{self, CoachReport, Summarizer};
use crate::config::AppConfig;
use crate::error::CoachError;
use crate::whoop::{Resource, WhoopApi};

pub const CONNECT_HINT: &str = "Connect WHOOP first at /auth/whoop";
pub const CONNECTED_MESSAGE: &str = "WHOOP connected successfully! You can close this tab.";

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthorizationFlow>,
    pub api: WhoopApi,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl AppState {
    pub fn new(
        flow: AuthorizationFlow,
        api: WhoopApi,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        Self {
            flow: Arc::new(flow),
            api,
            summarizer,
        }
    }

    /// Wire the flow, token manager, API proxy and optional coach from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoachError> {
        let tokens = Arc::new(config.token_manager()?);
        let summarizer = config
            .coach()
            .map(|coach| Arc::new(coach) as Arc<dyn Summarizer>);
        if summarizer.is_none() {
            warn!("OPENAI_API_KEY is not set; /run-coach is disabled");
        }
        Ok(Self::new(
            AuthorizationFlow::new(config.oauth()),
            config.whoop_api(tokens),
            summarizer,
        ))
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        self.api.client().tokens()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/whoop", get(start_authorization))
        .route("/callback", get(callback))
        .route("/test-recovery", get(test_recovery))
        .route("/test-sleep", get(test_sleep))
        .route("/test-workouts", get(test_workouts))
        .route("/test-body", get(test_body))
        .route("/run-coach", get(run_coach))
        .route("/health", get(health))
        .with_state(state)
}

/// Handler error, rendered by [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError(CoachError);

impl From<CoachError> for ApiError {
    fn from(err: CoachError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.needs_authorization() {
            return (StatusCode::UNAUTHORIZED, CONNECT_HINT).into_response();
        }
        match &err {
            CoachError::Auth(AuthError::StateMismatch | AuthError::MissingCode) => {
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            CoachError::Auth(AuthError::ExchangeFailed(_)) => {
                error!(error = %err, "Token exchange failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Token exchange failed.").into_response()
            }
            CoachError::Request(RequestError::Transport(TransportError::Status {
                status,
                body,
            })) => {
                let status =
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error!(%status, "Provider request failed");
                (status, Json(body_as_json(body))).into_response()
            }
            _ => {
                error!(error = %err, "Request failed");
                let body = err
                    .provider_body()
                    .map(body_as_json)
                    .unwrap_or_else(|| Value::String(err.to_string()));
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

fn body_as_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

async fn start_authorization(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let request = state.flow.begin_authorization()?;
    Ok(Redirect::to(&request.url))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<&'static str, ApiError> {
    let record = state
        .flow
        .complete_authorization(params.code.as_deref(), params.state.as_deref())
        .await?;
    state.tokens().seed(record).await?;
    info!("WHOOP account connected");
    Ok(CONNECTED_MESSAGE)
}

async fn proxy(state: &AppState, resource: Resource) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.api.fetch(resource).await?))
}

async fn test_recovery(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    proxy(&state, Resource::Recovery).await
}

async fn test_sleep(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    proxy(&state, Resource::LatestSleep).await
}

async fn test_workouts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    proxy(&state, Resource::Workouts).await
}

async fn test_body(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    proxy(&state, Resource::BodyMeasurement).await
}

async fn run_coach(State(state): State<AppState>) -> Result<Json<CoachReport>, ApiError> {
    let summarizer = state
        .summarizer
        .as_deref()
        .ok_or_else(|| CoachError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
    let report = coach::run_coach(&state.api, summarizer).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub authenticated: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        authenticated: state.tokens().has_credentials().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderError;
    use axum::body::to_bytes;

    async fn render(err: impl Into<CoachError>) -> (StatusCode, String) {
        let resp = ApiError(err.into()).into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn unauthenticated_maps_to_401_with_hint() {
        let (status, body) = render(RequestError::Auth(AuthError::Unauthenticated)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, CONNECT_HINT);
    }

    #[tokio::test]
    async fn callback_validation_errors_are_bad_requests() {
        let (status, body) = render(AuthError::StateMismatch).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid state");
        let (status, _) = render(AuthError::MissingCode).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_status_and_body_pass_through() {
        let (status, body) = render(RequestError::Transport(TransportError::Status {
            status: 404,
            body: r#"{"error":"not found"}"#.to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn refresh_failure_is_500_with_provider_body() {
        let (status, body) = render(RequestError::Auth(AuthError::RefreshFailed(
            ProviderError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            },
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#""invalid_grant""#);
    }
}
