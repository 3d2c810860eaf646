//! CLI auth command handlers.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::auth::{AuthError, AuthorizationFlow, CredentialStore, TokenManager};
use crate::config::AppConfig;
use crate::error::{CoachError, Result};
use crate::server::{CallbackParams, CONNECTED_MESSAGE};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle `whoop-coach auth status`.
pub fn handle_status(config: &AppConfig) -> Result<()> {
    let store = config.credential_store();

    println!("Token file: {}", store.path().display());
    match store.load_with_timestamp()? {
        Some((record, saved_at)) => {
            println!("Status: connected");
            if let Some(saved_at) = saved_at {
                println!("Saved: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(expires_in) = record.lifetime_secs() {
                println!("Access token lifetime: {expires_in}s");
            }
            let refreshable = if record.refresh_token.is_some() { "yes" } else { "no" };
            println!("Refresh token: {refreshable}");
            if let Some(scope) = &record.scope {
                println!("Scope: {scope}");
            }
        }
        None => println!("Status: not connected (run `whoop-coach auth login`)"),
    }

    let openai = if config.openai_api_key.is_some() { "set" } else { "not set" };
    println!("OPENAI_API_KEY: {openai}");
    Ok(())
}

/// Handle `whoop-coach auth login`.
///
/// Listens on the host and port of `CALLBACK_URL` for a single completed redirect, so it
/// cannot run next to `serve` on the same port.
pub async fn handle_login(config: &AppConfig) -> Result<()> {
    let callback = Url::parse(&config.callback_url)
        .map_err(|err| CoachError::Configuration(format!("CALLBACK_URL: {err}")))?;
    let host = callback.host_str().unwrap_or("127.0.0.1").to_string();
    let port = callback.port_or_known_default().ok_or_else(|| {
        CoachError::Configuration("CALLBACK_URL has no port".to_string())
    })?;

    let listener = TcpListener::bind((host.as_str(), port)).await.map_err(|err| {
        CoachError::Configuration(format!(
            "Cannot listen on {host}:{port} for the callback ({err}); is `serve` running?"
        ))
    })?;
    let tokens = Arc::new(config.token_manager()?);
    let flow = Arc::new(AuthorizationFlow::new(config.oauth()));
    let request = flow.begin_authorization()?;

    println!("Open this URL to connect WHOOP:\n\n  {}\n", request.url);
    println!("Waiting for the redirect to {}", config.callback_url);

    wait_for_callback(listener, callback.path(), flow, tokens, LOGIN_TIMEOUT).await?;
    println!("WHOOP connected.");
    Ok(())
}

#[derive(Clone)]
struct LoginState {
    flow: Arc<AuthorizationFlow>,
    tokens: Arc<TokenManager>,
    outcome: mpsc::Sender<std::result::Result<(), AuthError>>,
}

/// Serve `callback_path` on `listener` until one callback consumes the pending state.
///
/// A callback without a code is answered and ignored. Any other callback ends the wait,
/// and its outcome is returned.
pub async fn wait_for_callback(
    listener: TcpListener,
    callback_path: &str,
    flow: Arc<AuthorizationFlow>,
    tokens: Arc<TokenManager>,
    timeout: Duration,
) -> Result<()> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let app = Router::new()
        .route(callback_path, get(login_callback))
        .with_state(LoginState {
            flow,
            tokens,
            outcome: outcome_tx,
        });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(timeout, outcome_rx.recv()).await;
    let _ = shutdown_tx.send(());
    server.await.map_err(io::Error::other)??;

    match outcome {
        Ok(Some(outcome)) => Ok(outcome?),
        Ok(None) => Err(CoachError::Configuration(
            "Callback listener stopped before a login completed".to_string(),
        )),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "no authorization callback received",
        )
        .into()),
    }
}

async fn login_callback(
    State(state): State<LoginState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let completed = state
        .flow
        .complete_authorization(params.code.as_deref(), params.state.as_deref())
        .await;
    let outcome = match completed {
        Ok(record) => state.tokens.seed(record).await,
        Err(AuthError::MissingCode) => {
            debug!("Callback without a code, still waiting");
            return (StatusCode::BAD_REQUEST, AuthError::MissingCode.to_string()).into_response();
        }
        Err(err) => Err(err),
    };

    let response = match &outcome {
        Ok(()) => {
            info!("WHOOP account connected");
            CONNECTED_MESSAGE.into_response()
        }
        Err(err @ AuthError::StateMismatch) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    };
    let _ = state.outcome.try_send(outcome);
    response
}
