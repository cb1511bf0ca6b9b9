//! Prompt templates for quizbot.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts that frame each conversation segment of the agent loop.
///
/// `hints` are free-form strategy notes appended to the system prompt.
/// The loop never inspects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
    pub hints: Vec<String>,
    /// First user message of a session.
    pub start: String,
    /// User message after moving to a new level.
    pub new_level: String,
    /// User message after a soft reset.
    pub resume: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an Autonomous Quiz Solver.
You reply with a single JSON OBJECT and nothing else.

AVAILABLE TOOLS:
1. "navigate": {"url": "string"}
   - Fetches the page. Returns text, data links, audio URL and submission URL.
2. "transcribe_audio": {"audio_url": "string"}
   - Downloads and transcribes an audio file found on the page.
   - Use this IMMEDIATELY if the page contains an audio file.
3. "analyze_image": {"image_url": "string", "question": "string"}
   - Describes an image or extracts text/numbers from it.
4. "python_repl": {"code": "string"}
   - `pandas as pd`, `numpy as np`, `requests`, `json` and `re` are ALREADY imported.
   - Use `pd.read_csv(url)` to read CSVs. Always print() the values you need.
5. "submit_answer": {"submission_url": "string", "quiz_url": "string", "email": "string", "secret": "string", "answer": "any"}
   - Submits the final answer. The response may contain the next URL.
6. "done": {"next_url": "string or null"}
   - Moves to the next level when a submission returned a new URL.

RESPONSE FORMAT:
{
  "thought": "Reasoning",
  "tool_name": "name_of_tool_to_use",
  "parameters": { ... }
}

If you have the 'url' from a submission response:
{
  "thought": "Moving to next level",
  "tool_name": "done",
  "parameters": {"next_url": "the_new_url"}
}"#
            .to_string(),

            hints: vec![
                r#"Cutoff questions: calculate the metric (sum, mean) of the CSV column. First try comparing to the cutoff and submit "above" or "below". If that is rejected, submit the exact number."#.to_string(),
                r#"Audio tasks: if the navigation result has an "audio" field, call "transcribe_audio" immediately and solve the question from the transcription."#.to_string(),
            ],

            start: "Start solving. Current URL: {{url}}. Email: {{email}}. Secret: {{secret}}".to_string(),

            new_level: "New Level: {{url}}. Email: {{email}}. Secret: {{secret}}".to_string(),

            resume: "Resume solving at {{url}}. Previous attempts failed. Try new approach.".to_string(),
        }
    }
}

impl AgentPrompts {
    /// The system prompt with any strategy hints appended.
    pub fn system_with_hints(&self) -> String {
        if self.hints.is_empty() {
            return self.system.clone();
        }

        let hints = self
            .hints
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}. {}", i + 1, h))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n\nSTRATEGY HINTS:\n{}", self.system, hints)
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Render the system prompt, including strategy hints.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.agent.system_with_hints(), &HashMap::new())
    }

    pub fn start_message(&self, url: &str, email: &str, secret: &str) -> String {
        self.render_with_custom(&self.agent.start, &session_vars(url, email, secret))
    }

    pub fn new_level_message(&self, url: &str, email: &str, secret: &str) -> String {
        self.render_with_custom(&self.agent.new_level, &session_vars(url, email, secret))
    }

    pub fn resume_message(&self, url: &str, email: &str, secret: &str) -> String {
        self.render_with_custom(&self.agent.resume, &session_vars(url, email, secret))
    }
}

fn session_vars(url: &str, email: &str, secret: &str) -> HashMap<String, String> {
    HashMap::from([
        ("url".to_string(), url.to_string()),
        ("email".to_string(), email.to_string()),
        ("secret".to_string(), secret.to_string()),
    ])
}
