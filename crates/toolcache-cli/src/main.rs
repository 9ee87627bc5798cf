//! toolcache - offline asset cache for the tool inventory app.
//!
//! Runs the install, activate and fetch handlers from the command line and
//! can serve the app through the fetch handler as a local proxy.

mod cli;
mod commands;
mod server;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();
    info!("toolcache starting");

    let config = commands::resolve_config(&cli)?;

    match cli.command {
        Command::Install => commands::install(&config).await,
        Command::Activate => commands::activate(&config).await,
        Command::Update => commands::update(&config).await,
        Command::Fetch { path, output } => commands::fetch(&config, &path, output.as_deref()).await,
        Command::Status => commands::status(&config).await,
        Command::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.listen().to_string());
            commands::serve(&config, &listen).await
        }
        Command::Config { save } => commands::show_config(&config, save),
    }
}
