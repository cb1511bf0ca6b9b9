//! Routes parsed tool calls to collaborators and normalizes their output.

use super::decision::ToolCall;
use super::runner::QuizSession;
use crate::config::{AgentSettings, HostFix, ToolSettings};
use crate::tools::{SubmissionRequest, SubmissionResult, ToolContext};
use tracing::{info, warn};
use url::Url;

/// Text produced by one dispatch, plus the parsed submission when there was one.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub submission: Option<SubmissionResult>,
}

impl ToolOutput {
    fn text(text: String) -> Self {
        Self {
            text,
            submission: None,
        }
    }
}

/// Dispatches tool calls on behalf of one agent.
pub struct Dispatcher {
    tools: ToolContext,
    host_fixes: Vec<HostFix>,
    submission_suffix_fixes: Vec<String>,
    default_image_question: String,
    output_budget: usize,
    page_text_budget: usize,
}

impl Dispatcher {
    pub fn new(tools: ToolContext, tool_settings: &ToolSettings, agent_settings: &AgentSettings) -> Self {
        Self {
            tools,
            host_fixes: tool_settings.host_fixes.clone(),
            submission_suffix_fixes: tool_settings.submission_suffix_fixes.clone(),
            default_image_question: tool_settings.default_image_question.clone(),
            output_budget: agent_settings.output_budget,
            page_text_budget: agent_settings.page_text_budget,
        }
    }

    /// Run one tool call. Collaborator failures come back as text, never as errors.
    pub async fn dispatch(&self, call: &ToolCall, session: &QuizSession) -> ToolOutput {
        let output = match call {
            ToolCall::Navigate { url } => ToolOutput::text(self.navigate(url, session).await),

            ToolCall::TranscribeAudio { audio_url } => ToolOutput::text(
                match self.tools.transcriber.transcribe(audio_url).await {
                    Ok(text) => text,
                    Err(e) => format!("Transcription Error: {}", e),
                },
            ),

            ToolCall::AnalyzeImage {
                image_url,
                question,
            } => {
                let question = question
                    .as_deref()
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .unwrap_or(self.default_image_question.as_str());
                let target = resolve_against(image_url, &session.current_url)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| image_url.clone());
                ToolOutput::text(
                    match self.tools.image_analyzer.analyze(&target, question).await {
                        Ok(text) => text,
                        Err(e) => format!("Vision Error: {}", e),
                    },
                )
            }

            ToolCall::PythonRepl { code } => ToolOutput::text(
                match self.tools.code_runner.run(code).await {
                    Ok(output) => output.to_string(),
                    Err(e) => format!("Execution Error: {}", e),
                },
            ),

            ToolCall::SubmitAnswer { .. } => {
                let request = self.submission_request(call, session);
                match self.tools.submitter.submit(&request).await {
                    Ok(result) => ToolOutput {
                        text: result.raw.clone(),
                        submission: Some(result),
                    },
                    Err(e) => ToolOutput::text(format!("Submission Error: {}", e)),
                }
            }

            ToolCall::Done { .. } => {
                ToolOutput::text("Error: 'done' is handled by the agent loop.".to_string())
            }

            ToolCall::Unknown(name) => {
                warn!("Model asked for unknown tool {}", name);
                ToolOutput::text(format!("Error: Unknown tool name '{}'.", name))
            }
        };

        ToolOutput {
            text: truncate_with_marker(&output.text, self.output_budget),
            submission: output.submission,
        }
    }

    async fn navigate(&self, url: &str, session: &QuizSession) -> String {
        let target = self.correct_navigation_url(url, &session.current_url);
        if target != url {
            info!("Rewrote navigation target {} -> {}", url, target);
        }

        match self.tools.navigator.navigate(&target).await {
            Ok(mut snapshot) => {
                snapshot.text = truncate_with_marker(&snapshot.text, self.page_text_budget);
                match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(e) => format!("Navigation Error: {}", e),
                }
            }
            Err(e) => format!("Navigation Error: {}", e),
        }
    }

    /// Resolve relative targets and repair known host misspellings.
    pub fn correct_navigation_url(&self, url: &str, current_url: &str) -> String {
        let Some(mut parsed) = resolve_against(url, current_url) else {
            return url.to_string();
        };

        if let Some(host) = parsed.host_str().map(|h| h.to_string()) {
            let fixed = self
                .host_fixes
                .iter()
                .fold(host.clone(), |acc, fix| acc.replace(&fix.from, &fix.to));
            if fixed != host && parsed.set_host(Some(&fixed)).is_err() {
                return url.to_string();
            }
        }

        parsed.to_string()
    }

    /// Fill in everything the model left out and repair the endpoint URL.
    pub fn submission_request(&self, call: &ToolCall, session: &QuizSession) -> SubmissionRequest {
        let ToolCall::SubmitAnswer {
            submission_url,
            quiz_url,
            email,
            secret,
            answer,
        } = call
        else {
            return SubmissionRequest {
                submission_url: default_submission_url(&session.current_url),
                email: session.email.clone(),
                secret: session.secret.clone(),
                url: session.current_url.clone(),
                answer: serde_json::Value::Null,
            };
        };

        let endpoint = match submission_url {
            Some(raw) => {
                let resolved = resolve_against(raw, &session.current_url)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| raw.clone());
                self.strip_submission_suffixes(&resolved)
            }
            None => default_submission_url(&session.current_url),
        };

        SubmissionRequest {
            submission_url: endpoint,
            email: email.clone().unwrap_or_else(|| session.email.clone()),
            secret: secret.clone().unwrap_or_else(|| session.secret.clone()),
            url: quiz_url.clone().unwrap_or_else(|| session.current_url.clone()),
            answer: answer.clone(),
        }
    }

    fn strip_submission_suffixes(&self, url: &str) -> String {
        let mut url = url.to_string();
        for suffix in &self.submission_suffix_fixes {
            if let Some(stripped) = url.strip_suffix(suffix.as_str()) {
                // Never strip into the scheme or host.
                if stripped.matches('/').count() > 2 {
                    url = stripped.to_string();
                }
            }
        }
        url
    }
}

fn resolve_against(url: &str, current_url: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .or_else(|| Url::parse(current_url).ok()?.join(url).ok())
}

fn default_submission_url(current_url: &str) -> String {
    Url::parse(current_url)
        .and_then(|u| u.join("/submit"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}/submit", current_url.trim_end_matches('/')))
}

/// Cut `text` to `budget` characters, saying how much was dropped.
pub fn truncate_with_marker(text: &str, budget: usize) -> String {
    let total = text.chars().count();
    if total <= budget {
        return text.to_string();
    }

    let kept: String = text.chars().take(budget).collect();
    format!("{}\n...[truncated {} of {} chars]", kept, total - budget, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::StubTools;
    use crate::config::Prompts;
    use serde_json::json;
    use std::sync::Arc;

    fn session() -> QuizSession {
        QuizSession::new(
            "https://quiz.example.com/level1",
            "me@example.com",
            "s3cret",
            &Prompts::default(),
        )
    }

    fn dispatcher(stub: &Arc<StubTools>) -> Dispatcher {
        let tools = ToolSettings {
            host_fixes: vec![HostFix {
                from: "exmaple.com".to_string(),
                to: "example.com".to_string(),
            }],
            ..ToolSettings::default()
        };
        let agent = AgentSettings {
            output_budget: 200,
            page_text_budget: 20,
            ..AgentSettings::default()
        };
        Dispatcher::new(stub.context(), &tools, &agent)
    }

    fn submit(email: Option<&str>, secret: Option<&str>) -> ToolCall {
        ToolCall::SubmitAnswer {
            submission_url: Some("https://quiz.example.com/submit".to_string()),
            quiz_url: None,
            email: email.map(String::from),
            secret: secret.map(String::from),
            answer: json!(42),
        }
    }

    #[tokio::test]
    async fn test_navigate_rewrites_misspelled_host() {
        let stub = Arc::new(StubTools::new());
        let dispatcher = dispatcher(&stub);

        dispatcher
            .dispatch(
                &ToolCall::Navigate {
                    url: "https://quiz.exmaple.com/level2?x=1".to_string(),
                },
                &session(),
            )
            .await;

        assert_eq!(stub.navigated(), vec!["https://quiz.example.com/level2?x=1"]);
    }

    #[tokio::test]
    async fn test_navigate_resolves_relative_url() {
        let stub = Arc::new(StubTools::new());
        dispatcher(&stub)
            .dispatch(&ToolCall::Navigate { url: "/data.csv".to_string() }, &session())
            .await;
        assert_eq!(stub.navigated(), vec!["https://quiz.example.com/data.csv"]);
    }

    #[tokio::test]
    async fn test_navigate_truncates_page_text() {
        let stub = Arc::new(StubTools::new().with_page_text(&"x".repeat(100)));
        let output = dispatcher(&stub)
            .dispatch(&ToolCall::Navigate { url: "https://quiz.example.com/q".to_string() }, &session())
            .await;

        let snapshot: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        let text = snapshot["text"].as_str().unwrap();
        assert!(text.starts_with(&"x".repeat(20)));
        assert!(text.contains("[truncated 80 of 100 chars]"));
    }

    #[tokio::test]
    async fn test_submit_injects_session_credentials() {
        let stub = Arc::new(StubTools::new());
        let dispatcher = dispatcher(&stub);

        dispatcher.dispatch(&submit(None, None), &session()).await;
        dispatcher
            .dispatch(&submit(Some("model@example.com"), Some("model-secret")), &session())
            .await;

        let submissions = stub.submissions();
        assert_eq!(submissions[0].email, "me@example.com");
        assert_eq!(submissions[0].secret, "s3cret");
        assert_eq!(submissions[0].url, "https://quiz.example.com/level1");
        assert_eq!(submissions[1].email, "model@example.com");
        assert_eq!(submissions[1].secret, "model-secret");
    }

    #[test]
    fn test_submission_url_defaults_and_fixes() {
        let stub = Arc::new(StubTools::new());
        let dispatcher = dispatcher(&stub);
        let session = session();

        let mut call = submit(None, None);
        if let ToolCall::SubmitAnswer { submission_url, .. } = &mut call {
            *submission_url = None;
        }
        assert_eq!(
            dispatcher.submission_request(&call, &session).submission_url,
            "https://quiz.example.com/submit"
        );

        if let ToolCall::SubmitAnswer { submission_url, .. } = &mut call {
            *submission_url = Some("https://quiz.example.com/submit/".to_string());
        }
        assert_eq!(
            dispatcher.submission_request(&call, &session).submission_url,
            "https://quiz.example.com/submit"
        );

        if let ToolCall::SubmitAnswer { submission_url, .. } = &mut call {
            *submission_url = Some("/submit".to_string());
        }
        assert_eq!(
            dispatcher.submission_request(&call, &session).submission_url,
            "https://quiz.example.com/submit"
        );
    }

    #[tokio::test]
    async fn test_collaborator_failure_becomes_text() {
        let stub = Arc::new(StubTools::new().failing());
        let output = dispatcher(&stub)
            .dispatch(&ToolCall::TranscribeAudio { audio_url: "/a.mp3".to_string() }, &session())
            .await;
        assert!(output.text.starts_with("Transcription Error:"));
        assert!(output.submission.is_none());
    }

    #[tokio::test]
    async fn test_image_question_defaults() {
        let stub = Arc::new(StubTools::new());
        dispatcher(&stub)
            .dispatch(
                &ToolCall::AnalyzeImage {
                    image_url: "https://x/img.png".to_string(),
                    question: None,
                },
                &session(),
            )
            .await;
        assert_eq!(
            stub.image_requests(),
            vec![(
                "https://x/img.png".to_string(),
                ToolSettings::default().default_image_question
            )]
        );
    }

    #[tokio::test]
    async fn test_relative_image_url_resolves_against_page() {
        let stub = Arc::new(StubTools::new());
        dispatcher(&stub)
            .dispatch(
                &ToolCall::AnalyzeImage {
                    image_url: "assets/chart.png".to_string(),
                    question: Some("What is the tallest bar?".to_string()),
                },
                &session(),
            )
            .await;
        assert_eq!(
            stub.image_requests(),
            vec![(
                "https://quiz.example.com/assets/chart.png".to_string(),
                "What is the tallest bar?".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_name() {
        let stub = Arc::new(StubTools::new());
        let output = dispatcher(&stub)
            .dispatch(&ToolCall::Unknown("fly".to_string()), &session())
            .await;
        assert_eq!(output.text, "Error: Unknown tool name 'fly'.");
    }

    #[tokio::test]
    async fn test_output_budget_applies_to_every_tool() {
        let stub = Arc::new(StubTools::new().with_stdout(&"y".repeat(500)));
        let output = dispatcher(&stub)
            .dispatch(&ToolCall::PythonRepl { code: "print('y' * 500)".to_string() }, &session())
            .await;
        assert!(output.text.contains("...[truncated"));
        assert!(output.text.chars().count() < 260);
    }

    #[test]
    fn test_truncate_with_marker() {
        assert_eq!(truncate_with_marker("short", 10), "short");
        assert_eq!(
            truncate_with_marker("héllo wörld", 5),
            "héllo\n...[truncated 6 of 11 chars]"
        );
    }
}
