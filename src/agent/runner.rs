//! The quiz-solving state machine.

use super::conversation::Conversation;
use super::decision::{corrective_message, parse_decision, Decision, ToolCall};
use super::dispatch::Dispatcher;
use super::model::ModelClient;
use crate::config::{AgentSettings, Prompts, Settings};
use crate::error::{QuizError, Result};
use crate::tools::ToolContext;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Everything one solving session owns.
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub current_url: String,
    pub email: String,
    pub secret: String,
    /// Cycles since the last conversation reset of any kind.
    pub step_count: u32,
    /// Cycles spent on the current level.
    pub level_steps: u32,
    /// Levels completed so far.
    pub level: u32,
    pub conversation: Conversation,
}

impl QuizSession {
    pub fn new(url: &str, email: &str, secret: &str, prompts: &Prompts) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            current_url: url.to_string(),
            email: email.to_string(),
            secret: secret.to_string(),
            step_count: 0,
            level_steps: 0,
            level: 0,
            conversation: Conversation::new(
                prompts.system_prompt(),
                prompts.start_message(url, email, secret),
            ),
        }
    }

    /// Drop the history but stay on the same level.
    pub fn soft_reset(&mut self, prompts: &Prompts) {
        self.conversation.reset(
            prompts.system_prompt(),
            prompts.resume_message(&self.current_url, &self.email, &self.secret),
        );
        self.step_count = 0;
    }

    /// Move on to the next level with a fresh conversation.
    pub fn enter_level(&mut self, url: String, prompts: &Prompts) {
        self.conversation.reset(
            prompts.system_prompt(),
            prompts.new_level_message(&url, &self.email, &self.secret),
        );
        self.current_url = url;
        self.level += 1;
        self.step_count = 0;
        self.level_steps = 0;
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Success,
    DoneNoProgress,
    StepLimit,
    ModelsExhausted,
    Fatal(String),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Success)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Success => write!(f, "success"),
            Termination::DoneNoProgress => write!(f, "done without a next level"),
            Termination::StepLimit => write!(f, "step limit reached"),
            Termination::ModelsExhausted => write!(f, "all models exhausted"),
            Termination::Fatal(cause) => write!(f, "fatal: {}", cause),
        }
    }
}

/// Loop states. `Terminated` is absorbing.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Running,
    AwaitingDecision(String),
    Dispatching(Decision),
    LevelTransition(String),
    Terminated(Termination),
}

/// Drives sessions: query the model, parse, dispatch, repeat.
pub struct Agent {
    model: ModelClient,
    dispatcher: Dispatcher,
    prompts: Prompts,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(model: ModelClient, dispatcher: Dispatcher, prompts: Prompts, settings: AgentSettings) -> Self {
        Self {
            model,
            dispatcher,
            prompts,
            settings,
        }
    }

    /// Build the production agent: real model client and HTTP collaborators.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let tools = ToolContext::from_settings(settings)?;
        Self::with_tools(settings, tools)
    }

    /// Build an agent around an existing set of collaborators.
    pub fn with_tools(settings: &Settings, tools: ToolContext) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        settings.agent.validate()?;

        Ok(Self::new(
            ModelClient::from_settings(&settings.model)?,
            Dispatcher::new(tools, &settings.tools, &settings.agent),
            prompts,
            settings.agent.clone(),
        ))
    }

    /// Solve a quiz chain starting at `url`.
    pub async fn solve(&self, url: &str, email: &str, secret: &str) -> Termination {
        let mut session = QuizSession::new(url, email, secret, &self.prompts);
        self.run(&mut session).await
    }

    /// Run a session until it terminates.
    #[instrument(skip_all, fields(session = %session.id))]
    pub async fn run(&self, session: &mut QuizSession) -> Termination {
        info!("Starting session at {}", session.current_url);

        let mut state = LoopState::Running;
        let reason = loop {
            state = match state {
                LoopState::Terminated(reason) => break reason,
                other => self.advance(session, other).await,
            };
        };

        let elapsed = Utc::now() - session.started_at;
        match &reason {
            Termination::Success => info!(
                "Session finished: {} after {} level(s) in {}s",
                reason,
                session.level + 1,
                elapsed.num_seconds()
            ),
            Termination::Fatal(_) => error!("Session ended: {} at {}", reason, session.current_url),
            _ => warn!("Session ended: {} at {}", reason, session.current_url),
        }
        reason
    }

    /// Perform one state transition.
    pub async fn advance(&self, session: &mut QuizSession, state: LoopState) -> LoopState {
        match state {
            LoopState::Running => self.query(session).await,

            LoopState::AwaitingDecision(raw) => {
                session.conversation.push_assistant(raw.as_str());
                match parse_decision(&raw) {
                    Ok(decision) => {
                        if !decision.thought.is_empty() {
                            info!("Thought: {}", decision.thought);
                        }
                        LoopState::Dispatching(decision)
                    }
                    Err(e) => {
                        warn!("Malformed decision: {}", e);
                        session.conversation.push_user(corrective_message(&e));
                        LoopState::Running
                    }
                }
            }

            LoopState::Dispatching(decision) => self.dispatch(session, decision).await,

            LoopState::LevelTransition(url) => {
                info!("Level {} complete, moving to {}", session.level + 1, url);
                session.enter_level(url, &self.prompts);
                LoopState::Running
            }

            terminated @ LoopState::Terminated(_) => terminated,
        }
    }

    async fn query(&self, session: &mut QuizSession) -> LoopState {
        session.step_count += 1;
        session.level_steps += 1;

        if session.level_steps > self.settings.max_steps {
            return LoopState::Terminated(Termination::StepLimit);
        }
        if session.step_count > self.settings.soft_reset_after {
            info!("No progress after {} steps, resetting context", self.settings.soft_reset_after);
            session.soft_reset(&self.prompts);
        }

        debug!(
            "Step {} (level step {}/{})",
            session.step_count, session.level_steps, self.settings.max_steps
        );

        match self.model.decide(&session.conversation).await {
            Ok(raw) => LoopState::AwaitingDecision(raw),
            Err(QuizError::AllModelsExhausted { tried }) => {
                error!("All {} models exhausted", tried);
                LoopState::Terminated(Termination::ModelsExhausted)
            }
            Err(e) if e.is_fatal() => LoopState::Terminated(Termination::Fatal(e.to_string())),
            Err(e) => {
                warn!("Model call failed: {}", e);
                tokio::time::sleep(self.settings.error_backoff()).await;
                LoopState::Running
            }
        }
    }

    async fn dispatch(&self, session: &mut QuizSession, decision: Decision) -> LoopState {
        info!("Tool: {}", decision.call.name());

        match &decision.call {
            ToolCall::Done { next_url } => match next_url {
                Some(next) if *next != session.current_url => LoopState::LevelTransition(next.clone()),
                _ => LoopState::Terminated(Termination::DoneNoProgress),
            },

            call => {
                let output = self.dispatcher.dispatch(call, session).await;
                if output
                    .submission
                    .as_ref()
                    .is_some_and(|result| result.is_final_success())
                {
                    return LoopState::Terminated(Termination::Success);
                }
                debug!("Tool output: {} chars", output.text.len());
                session.conversation.push_user(format!("Tool Output: {}", output.text));
                LoopState::Running
            }
        }
    }
}
