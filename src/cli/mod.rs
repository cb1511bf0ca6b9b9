//! CLI module for quizbot.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// quizbot - autonomous solver for chained web quizzes
///
/// Runs an LLM agent that reads each quiz page, works out the answer with
/// its tools, submits it, and follows the chain to the next level.
#[derive(Parser, Debug)]
#[command(name = "quizbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server that accepts quiz tasks
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Solve a single quiz chain in the foreground
    Solve {
        /// URL of the first quiz page
        url: String,

        /// Email identifying the participant
        #[arg(short, long)]
        email: String,

        /// Quiz secret (defaults to the secret named by server.secret_env)
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solve() {
        let cli = Cli::try_parse_from([
            "quizbot",
            "-v",
            "solve",
            "https://x/level1",
            "--email",
            "me@example.com",
            "--secret",
            "s3cret",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Solve { url, email, secret } => {
                assert_eq!(url, "https://x/level1");
                assert_eq!(email, "me@example.com");
                assert_eq!(secret.as_deref(), Some("s3cret"));
            }
            other => panic!("Expected Solve, got {:?}", other),
        }
    }

    #[test]
    fn test_solve_secret_is_optional() {
        let cli = Cli::try_parse_from(["quizbot", "solve", "https://x/level1", "-e", "me@example.com"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Solve { secret: None, .. }));
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["quizbot", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { host: None, port: None }));
    }
}
