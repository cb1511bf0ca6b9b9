//! Configuration settings for quizbot.

use crate::error::QuizError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP front door settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Shared secret expected in every quiz request.
    pub secret: Option<String>,
    /// Environment variable that overrides `secret` when set.
    pub secret_env: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            secret: None,
            secret_env: "QUIZ_SECRET".to_string(),
        }
    }
}

impl ServerSettings {
    /// Resolve the expected request secret, preferring the environment.
    pub fn resolve_secret(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.secret.clone().filter(|s| !s.is_empty()))
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Models tried in order, most capable first.
    pub models: Vec<String>,
    pub temperature: f32,
    /// Upper bound for a single completion attempt.
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            models: vec![
                "llama-3.3-70b-versatile".to_string(),
                "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
                "llama-3.1-8b-instant".to_string(),
            ],
            temperature: 0.1,
            request_timeout_secs: 90,
        }
    }
}

impl ModelSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Agent loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Hard ceiling on cycles spent on a single level.
    pub max_steps: u32,
    /// Cycles after which the conversation is wiped and resumed.
    pub soft_reset_after: u32,
    /// Pause after a non-fatal cycle error.
    pub error_backoff_ms: u64,
    /// Character budget for any tool output fed back to the model.
    pub output_budget: usize,
    /// Character budget for scraped page text.
    pub page_text_budget: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 35,
            soft_reset_after: 15,
            error_backoff_ms: 2000,
            output_budget: 4000,
            page_text_budget: 1500,
        }
    }
}

impl AgentSettings {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Reject limits that would stop the loop from making progress.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_steps == 0 {
            return Err(QuizError::Config("agent.max_steps must be at least 1".to_string()));
        }
        // A reset on every cycle would hide every tool result from the model.
        if self.soft_reset_after == 0 {
            return Err(QuizError::Config(
                "agent.soft_reset_after must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Substring rewrite applied to URL hosts the model commonly misspells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostFix {
    pub from: String,
    pub to: String,
}

/// Tool collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Base used to resolve host-relative media URLs.
    pub base_url: String,
    pub fetch_timeout_secs: u64,
    pub transcription_model: String,
    /// Downloads smaller than this are not treated as audio.
    pub min_audio_bytes: usize,
    pub vision_model: String,
    pub default_image_question: String,
    pub python_bin: String,
    pub exec_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub host_fixes: Vec<HostFix>,
    /// Suffixes stripped from submission URLs.
    pub submission_suffix_fixes: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            base_url: "https://tds-llm-analysis.s-anand.net".to_string(),
            fetch_timeout_secs: 60,
            transcription_model: "whisper-large-v3".to_string(),
            min_audio_bytes: 100,
            vision_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            default_image_question: "Describe this image and extract any text, numbers, or codes it contains.".to_string(),
            python_bin: "python3".to_string(),
            exec_timeout_secs: 45,
            submit_timeout_secs: 15,
            host_fixes: vec![
                HostFix {
                    from: "s-anand.com".to_string(),
                    to: "s-anand.net".to_string(),
                },
                HostFix {
                    from: "tds-llm-analysis.sanand.net".to_string(),
                    to: "tds-llm-analysis.s-anand.net".to_string(),
                },
            ],
            submission_suffix_fixes: vec!["/".to_string(), ".json".to_string()],
        }
    }
}

impl ToolSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => Self::expand_path(&p.to_string_lossy()),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizbot")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_bound_the_loop() {
        let settings = Settings::default();
        assert_eq!(settings.agent.max_steps, 35);
        assert!(settings.agent.soft_reset_after < settings.agent.max_steps);
        assert!(!settings.model.models.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_steps = 10

            [model]
            models = ["a", "b"]

            [[tools.host_fixes]]
            from = "exmaple.com"
            to = "example.com"
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.max_steps, 10);
        assert_eq!(settings.agent.soft_reset_after, 15);
        assert_eq!(settings.model.models, vec!["a", "b"]);
        assert_eq!(settings.model.api_key_env, "GROQ_API_KEY");
        assert_eq!(
            settings.tools.host_fixes,
            vec![HostFix {
                from: "exmaple.com".to_string(),
                to: "example.com".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_agent_limits_are_validated() {
        assert!(AgentSettings::default().validate().is_ok());

        let no_reset = AgentSettings {
            soft_reset_after: 0,
            ..AgentSettings::default()
        };
        let err = no_reset.validate().unwrap_err();
        assert!(matches!(err, QuizError::Config(ref msg) if msg.contains("soft_reset_after")));

        let no_steps = AgentSettings {
            max_steps: 0,
            ..AgentSettings::default()
        };
        assert!(matches!(no_steps.validate(), Err(QuizError::Config(_))));
    }

    #[test]
    fn test_file_secret_used_when_env_unset() {
        let server = ServerSettings {
            secret: Some("file-secret".to_string()),
            secret_env: "QUIZBOT_TEST_SECRET_THAT_IS_NEVER_SET".to_string(),
            ..ServerSettings::default()
        };
        assert_eq!(server.resolve_secret().as_deref(), Some("file-secret"));
    }
}
