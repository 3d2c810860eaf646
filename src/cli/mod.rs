//! CLI entry point for whoop-coach.

pub mod auth;

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::coach;
use crate::config::AppConfig;
use crate::error::{CoachError, Result};
use crate::server::{self, AppState};
use crate::whoop::Resource;

/// WHOOP data coach
#[derive(Parser, Debug)]
#[command(name = "whoop-coach", version, about = "WHOOP OAuth client and AI training coach")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (authorization routes and data endpoints)
    Serve(ServeArgs),
    /// Connect WHOOP or inspect stored credentials
    Auth(AuthArgs),
    /// Fetch one WHOOP resource with the stored credentials
    Fetch(FetchArgs),
    /// Fetch recovery and ask the coach for a plan
    Coach,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on; overrides BIND_ADDR
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Show whether a token is stored
    Status,
    /// Connect WHOOP in the browser, listening on CALLBACK_URL for the redirect
    Login,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    pub resource: FetchTarget,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchTarget {
    Recovery,
    Sleep,
    Workouts,
    Body,
    Cycles,
}

impl From<FetchTarget> for Resource {
    fn from(target: FetchTarget) -> Self {
        match target {
            FetchTarget::Recovery => Resource::Recovery,
            FetchTarget::Sleep => Resource::LatestSleep,
            FetchTarget::Workouts => Resource::Workouts,
            FetchTarget::Body => Resource::BodyMeasurement,
            FetchTarget::Cycles => Resource::Cycles,
        }
    }
}

/// Handle `whoop-coach serve`.
pub async fn handle_serve(config: &AppConfig, args: &ServeArgs) -> Result<()> {
    let addr = args.bind.as_deref().unwrap_or(&config.bind_addr);
    let state = AppState::from_config(config)?;
    let app = server::router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");
    println!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutting down");
    Ok(())
}

/// Handle `whoop-coach fetch <resource>`.
pub async fn handle_fetch(config: &AppConfig, target: FetchTarget) -> Result<()> {
    let tokens = Arc::new(config.token_manager()?);
    let api = config.whoop_api(tokens);
    let data = api.fetch(target.into()).await?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Handle `whoop-coach coach`.
pub async fn handle_coach(config: &AppConfig) -> Result<()> {
    let summarizer = config
        .coach()
        .ok_or_else(|| CoachError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
    let tokens = Arc::new(config.token_manager()?);
    let api = config.whoop_api(tokens);
    let report = coach::run_coach(&api, &summarizer).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
