//! Decision parsing: the model's per-turn tool selection.

use crate::error::{QuizError, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// Tool names with a typed parameter set.
const KNOWN_TOOLS: &[&str] = &[
    "navigate",
    "transcribe_audio",
    "analyze_image",
    "python_repl",
    "submit_answer",
    "done",
];

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool_name", content = "parameters", rename_all = "snake_case")]
pub enum ToolCall {
    /// Fetch a quiz page.
    Navigate { url: String },

    /// Transcribe an audio clip.
    TranscribeAudio { audio_url: String },

    /// Ask a question about an image.
    AnalyzeImage {
        image_url: String,
        #[serde(default)]
        question: Option<String>,
    },

    /// Run Python code.
    PythonRepl { code: String },

    /// Submit an answer. Missing fields are filled from the session.
    SubmitAnswer {
        #[serde(default)]
        submission_url: Option<String>,
        #[serde(default)]
        quiz_url: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        secret: Option<String>,
        answer: Value,
    },

    /// Level finished; move on to `next_url` if there is one.
    Done {
        #[serde(default)]
        next_url: Option<String>,
    },

    /// Any tool name we do not know.
    #[serde(skip)]
    Unknown(String),
}

impl ToolCall {
    pub fn name(&self) -> &str {
        match self {
            ToolCall::Navigate { .. } => "navigate",
            ToolCall::TranscribeAudio { .. } => "transcribe_audio",
            ToolCall::AnalyzeImage { .. } => "analyze_image",
            ToolCall::PythonRepl { .. } => "python_repl",
            ToolCall::SubmitAnswer { .. } => "submit_answer",
            ToolCall::Done { .. } => "done",
            ToolCall::Unknown(name) => name,
        }
    }
}

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Free-form reasoning, only ever logged.
    pub thought: String,
    pub call: ToolCall,
}

/// Parse raw model output into a [`Decision`].
///
/// Unknown tool names parse successfully as [`ToolCall::Unknown`]; anything
/// structurally wrong is a [`QuizError::MalformedDecision`].
pub fn parse_decision(raw: &str) -> Result<Decision> {
    let value = parse_json_object(raw).ok_or_else(|| {
        QuizError::MalformedDecision("response is not a JSON object".to_string())
    })?;

    let name = value
        .get("tool_name")
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuizError::MalformedDecision("missing 'tool_name'".to_string()))?;

    let thought = value
        .get("thought")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if !KNOWN_TOOLS.contains(&name) {
        return Ok(Decision {
            thought,
            call: ToolCall::Unknown(name.to_string()),
        });
    }

    let parameters = value
        .get("parameters")
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!({}));

    let call: ToolCall = serde_json::from_value(json!({
        "tool_name": name,
        "parameters": parameters,
    }))
    .map_err(|e| QuizError::MalformedDecision(format!("invalid parameters for '{}': {}", name, e)))?;

    Ok(Decision {
        thought,
        call: normalize(call),
    })
}

/// The user message sent back after a malformed decision.
pub fn corrective_message(error: &QuizError) -> String {
    let reason = match error {
        QuizError::MalformedDecision(reason) => reason.clone(),
        other => other.to_string(),
    };
    format!(
        "Error: {}. Output valid JSON only, as {{\"thought\": \"...\", \"tool_name\": \"...\", \"parameters\": {{...}}}}.",
        reason
    )
}

/// Parse the whole response as an object, or fall back to the outermost braces.
fn parse_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn normalize(call: ToolCall) -> ToolCall {
    match call {
        ToolCall::Done { next_url } => ToolCall::Done {
            next_url: non_blank(next_url),
        },
        ToolCall::SubmitAnswer {
            submission_url,
            quiz_url,
            email,
            secret,
            answer,
        } => ToolCall::SubmitAnswer {
            submission_url: non_blank(submission_url),
            quiz_url: non_blank(quiz_url),
            email: non_blank(email),
            secret: non_blank(secret),
            answer,
        },
        other => other,
    }
}

/// Models sometimes write `"null"` or `""` where they mean absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null" && s != "None")
}
