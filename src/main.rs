//! whoop-coach binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use whoop_coach::cli::{AuthCommands, Cli, Commands};
use whoop_coach::config::AppConfig;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => whoop_coach::cli::handle_serve(&config, &args).await,
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Status => whoop_coach::cli::auth::handle_status(&config),
            AuthCommands::Login => whoop_coach::cli::auth::handle_login(&config).await,
        },
        Commands::Fetch(args) => whoop_coach::cli::handle_fetch(&config, args.resource).await,
        Commands::Coach => whoop_coach::cli::handle_coach(&config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    // RUST_LOG wins over the default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
