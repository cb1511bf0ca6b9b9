//! In-process stand-ins for the model backend and tool collaborators.

use super::conversation::Message;
use super::model::ChatBackend;
use crate::error::{QuizError, Result};
use crate::tools::{
    CodeRunner, ExecutionOutput, ImageAnalyzer, Navigator, PageSnapshot, SubmissionRequest,
    SubmissionResult, Submitter, ToolContext, Transcriber,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Failure {
    RateLimit,
    Unavailable,
    Broken(String),
}

/// Chat backend that replays canned replies and per-model failures.
#[derive(Default)]
pub struct ScriptedBackend {
    failures: HashMap<String, Failure>,
    replies: Mutex<VecDeque<String>>,
    fallback_reply: Option<String>,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `model` always answers with a quota error.
    pub fn rate_limit(mut self, model: &str) -> Self {
        self.failures.insert(model.to_string(), Failure::RateLimit);
        self
    }

    /// `model` always reports itself unavailable.
    pub fn unavailable(mut self, model: &str) -> Self {
        self.failures.insert(model.to_string(), Failure::Unavailable);
        self
    }

    /// `model` always fails with a non-quota error.
    pub fn broken(mut self, model: &str, message: &str) -> Self {
        self.failures
            .insert(model.to_string(), Failure::Broken(message.to_string()));
        self
    }

    /// Queue one reply.
    pub fn reply(self, text: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(text.to_string());
        self
    }

    /// Reply used once the queue is empty.
    pub fn reply_forever(mut self, text: &str) -> Self {
        self.fallback_reply = Some(text.to_string());
        self
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(model, _)| model.clone())
            .collect()
    }

    /// Conversation snapshots, one per call.
    pub fn conversations(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, messages)| messages.clone())
            .collect()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, model: &str, messages: &[Message], _temperature: f32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        match self.failures.get(model).cloned() {
            Some(Failure::RateLimit) => {
                return Err(QuizError::RateLimited {
                    model: model.to_string(),
                    message: "rate limit reached".to_string(),
                })
            }
            Some(Failure::Unavailable) => {
                return Err(QuizError::ModelUnavailable {
                    model: model.to_string(),
                    message: "model does not exist".to_string(),
                })
            }
            Some(Failure::Broken(message)) => return Err(QuizError::OpenAI(message)),
            None => {}
        }

        let queued = self.replies.lock().unwrap().pop_front();
        queued
            .or_else(|| self.fallback_reply.clone())
            .ok_or_else(|| QuizError::OpenAI("script exhausted".to_string()))
    }
}

/// Every tool collaborator at once, recording what it was asked to do.
pub struct StubTools {
    page_text: String,
    stdout: String,
    failing: bool,
    submit_bodies: Mutex<VecDeque<String>>,
    navigated: Mutex<Vec<String>>,
    image_requests: Mutex<Vec<(String, String)>>,
    submissions: Mutex<Vec<SubmissionRequest>>,
}

impl Default for StubTools {
    fn default() -> Self {
        Self {
            page_text: "Q1. What is the answer?".to_string(),
            stdout: "42\n".to_string(),
            failing: false,
            submit_bodies: Mutex::new(VecDeque::new()),
            navigated: Mutex::new(Vec::new()),
            image_requests: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }
}

impl StubTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_text(mut self, text: &str) -> Self {
        self.page_text = text.to_string();
        self
    }

    pub fn with_stdout(mut self, text: &str) -> Self {
        self.stdout = text.to_string();
        self
    }

    /// Every collaborator returns an error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Queue one submission response body. Defaults to an incorrect answer.
    pub fn with_submit_body(self, body: &str) -> Self {
        self.submit_bodies
            .lock()
            .unwrap()
            .push_back(body.to_string());
        self
    }

    pub fn context(self: &Arc<Self>) -> ToolContext {
        ToolContext::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn navigated(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }

    /// `(image_url, question)` pairs, in call order.
    pub fn image_requests(&self) -> Vec<(String, String)> {
        self.image_requests.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.lock().unwrap().clone()
    }

    fn check(&self, error: fn(String) -> QuizError) -> Result<()> {
        if self.failing {
            return Err(error("stub failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Navigator for StubTools {
    async fn navigate(&self, url: &str) -> Result<PageSnapshot> {
        self.navigated.lock().unwrap().push(url.to_string());
        self.check(QuizError::Navigation)?;
        Ok(PageSnapshot {
            text: self.page_text.clone(),
            ..PageSnapshot::default()
        })
    }
}

#[async_trait]
impl Transcriber for StubTools {
    async fn transcribe(&self, _audio_url: &str) -> Result<String> {
        self.check(QuizError::Transcription)?;
        Ok("TRANSCRIPTION: the cutoff is 500".to_string())
    }
}

#[async_trait]
impl ImageAnalyzer for StubTools {
    async fn analyze(&self, image_url: &str, question: &str) -> Result<String> {
        self.image_requests
            .lock()
            .unwrap()
            .push((image_url.to_string(), question.to_string()));
        self.check(QuizError::Vision)?;
        Ok("IMAGE ANALYSIS: a bar chart".to_string())
    }
}

#[async_trait]
impl CodeRunner for StubTools {
    async fn run(&self, _code: &str) -> Result<ExecutionOutput> {
        self.check(QuizError::Execution)?;
        Ok(ExecutionOutput::Stdout(self.stdout.clone()))
    }
}

#[async_trait]
impl Submitter for StubTools {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult> {
        self.submissions.lock().unwrap().push(request.clone());
        self.check(QuizError::OpenAI)?;
        let body = self
            .submit_bodies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| r#"{"correct": false, "reason": "Wrong answer"}"#.to_string());
        Ok(SubmissionResult::from_body(&body))
    }
}
