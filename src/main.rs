//! quizbot CLI entry point.

use anyhow::Result;
use clap::Parser;
use quizbot::cli::{commands, Cli, Commands};
use quizbot::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("quizbot={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Solve { url, email, secret } => {
            commands::run_solve(url, email, secret.clone(), settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
