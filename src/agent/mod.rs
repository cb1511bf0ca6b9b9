//! Autonomous quiz-solving agent.
//!
//! A session alternates between asking the model for a JSON decision and
//! dispatching the chosen tool, feeding every tool result back as a user
//! message until the quiz chain is solved or a limit is hit.

mod conversation;
mod decision;
mod dispatch;
mod model;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{Conversation, Message, Role};
pub use decision::{corrective_message, parse_decision, Decision, ToolCall};
pub use dispatch::{truncate_with_marker, Dispatcher, ToolOutput};
pub use model::{ChatBackend, ModelClient, OpenAiChat};
pub use runner::{Agent, LoopState, QuizSession, Termination};
