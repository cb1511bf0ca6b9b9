//! Tool collaborators invoked by the agent loop.
//!
//! Each collaborator is a single-method async trait so the loop can run
//! against stubs. Implementations own their timeouts; their errors are turned
//! into text by the dispatcher and never end a session.

mod execution;
mod navigation;
mod submission;
mod transcription;
mod vision;

pub use execution::PythonRunner;
pub use navigation::{extract_page, HttpNavigator};
pub use submission::HttpSubmitter;
pub use transcription::WhisperTranscriber;
pub use vision::VisionAnalyzer;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A link that likely points at quiz data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageLink {
    pub href: String,
    pub text: String,
}

/// What the model gets to see of a quiz page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PageSnapshot {
    pub text: String,
    pub links: Vec<PageLink>,
    pub audio: Option<String>,
    pub submission_url: Option<String>,
}

/// Result of running a code snippet.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutput {
    Stdout(String),
    Stderr(String),
}

impl fmt::Display for ExecutionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutput::Stdout(out) => write!(f, "STDOUT:\n{}", out),
            ExecutionOutput::Stderr(err) => write!(f, "STDERR:\n{}", err),
        }
    }
}

/// Fully resolved answer submission.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionRequest {
    #[serde(skip)]
    pub submission_url: String,
    pub email: String,
    pub secret: String,
    /// The quiz page being answered.
    pub url: String,
    pub answer: serde_json::Value,
}

/// Response from the submission endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub correct: Option<bool>,
    pub url: Option<String>,
    /// Body as received (re-serialised when it was JSON).
    pub raw: String,
}

impl SubmissionResult {
    /// Parse a response body, keeping non-JSON bodies as raw text.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => {
                let correct = value.get("correct").and_then(|v| v.as_bool());
                let url = value
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty() && *s != "null")
                    .map(|s| s.to_string());
                Self {
                    correct,
                    url,
                    raw: value.to_string(),
                }
            }
            Err(_) => Self {
                correct: None,
                url: None,
                raw: body.to_string(),
            },
        }
    }

    /// Correct answer and no further level to visit.
    pub fn is_final_success(&self) -> bool {
        self.correct == Some(true) && self.url.is_none()
    }
}

/// Fetches and summarizes web pages.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<PageSnapshot>;
}

/// Turns an audio URL into a transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<String>;
}

/// Answers a question about an image.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str, question: &str) -> Result<String>;
}

/// Runs untrusted code in an isolated process.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str) -> Result<ExecutionOutput>;
}

/// Posts answers to the quiz server.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult>;
}

/// The set of collaborators available to the dispatcher.
#[derive(Clone)]
pub struct ToolContext {
    pub navigator: Arc<dyn Navigator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub image_analyzer: Arc<dyn ImageAnalyzer>,
    pub code_runner: Arc<dyn CodeRunner>,
    pub submitter: Arc<dyn Submitter>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(
        navigator: Arc<dyn Navigator>,
        transcriber: Arc<dyn Transcriber>,
        image_analyzer: Arc<dyn ImageAnalyzer>,
        code_runner: Arc<dyn CodeRunner>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self {
            navigator,
            transcriber,
            image_analyzer,
            code_runner,
            submitter,
        }
    }

    /// Build the production collaborators from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = crate::openai::create_client(&settings.model)?;
        let tools = &settings.tools;

        Ok(Self::new(
            Arc::new(HttpNavigator::new(tools.fetch_timeout())?),
            Arc::new(WhisperTranscriber::new(client.clone(), tools)?),
            Arc::new(VisionAnalyzer::new(client, tools)?),
            Arc::new(PythonRunner::new(&tools.python_bin, tools.exec_timeout())),
            Arc::new(HttpSubmitter::new(tools.submit_timeout())?),
        ))
    }
}
