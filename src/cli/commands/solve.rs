//! Solve command: run one quiz session in the foreground.

use crate::agent::Agent;
use crate::cli::{preflight, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the solve command.
pub async fn run_solve(url: &str, email: &str, secret: Option<String>, settings: Settings) -> Result<()> {
    preflight::check(&settings)?;

    let secret = secret
        .or_else(|| settings.server.resolve_secret())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No quiz secret given. Pass --secret or set {}.",
                settings.server.secret_env
            )
        })?;

    let agent = Agent::from_settings(&settings)?;

    Output::header("Quiz Solver");
    Output::kv("Start", url);
    Output::kv("Email", email);
    Output::kv("Models", &settings.model.models.join(", "));
    println!();

    let reason = agent.solve(url, email, &secret).await;

    if reason.is_success() {
        Output::success(&format!("Finished: {}", reason));
    } else {
        Output::warning(&format!("Stopped: {}", reason));
    }

    Ok(())
}
