//! whoop-coach: WHOOP OAuth2 client with reactive token refresh and an AI coaching summary.
//!
//! The core is [`auth::TokenManager`], the single owner of the current token record, and
//! [`client::AuthenticatedClient`], which attaches it to outgoing requests and recovers from a
//! 401 with one refresh and one retry.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use whoop_coach::config::AppConfig;
//!
//! # async fn example() -> whoop_coach::error::Result<()> {
//! let config = AppConfig::from_env()?;
//! let tokens = Arc::new(config.token_manager()?);
//! let api = config.whoop_api(tokens);
//! let recovery = api.recovery().await?;
//! println!("{recovery}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod coach;
pub mod config;
pub mod error;
pub mod whoop;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
