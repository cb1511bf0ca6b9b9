//! Pre-flight checks before starting a session or the server.
//!
//! Validates that the model API key and the Python interpreter are available
//! so a session does not fail on its first model call or code run.

use crate::config::Settings;
use crate::error::{QuizError, Result};
use std::process::Command;

/// Run all pre-flight checks.
pub fn check(settings: &Settings) -> Result<()> {
    crate::openai::api_key(&settings.model)?;
    check_tool(&settings.tools.python_bin)?;
    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(QuizError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(QuizError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(QuizError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;

    #[test]
    fn test_missing_tool_is_reported() {
        let err = check_tool("quizbot-no-such-binary").unwrap_err();
        assert!(matches!(err, QuizError::ToolNotFound(name) if name == "quizbot-no-such-binary"));
    }

    #[test]
    fn test_missing_api_key_fails_first() {
        let mut settings = Settings::default();
        settings.model.api_key_env = "QUIZBOT_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        settings.tools = ToolSettings {
            python_bin: "quizbot-no-such-binary".to_string(),
            ..ToolSettings::default()
        };
        assert!(matches!(check(&settings), Err(QuizError::Config(_))));
    }
}
