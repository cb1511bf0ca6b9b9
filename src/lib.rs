//! quizbot - an autonomous LLM agent for chained web quizzes
//!
//! A quiz is a chain of web pages. Each page poses a question that may need
//! scraping, audio transcription, image analysis or data crunching; a correct
//! answer posted to the quiz server unlocks the next page.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `agent` - Conversation state, decision parsing, model fallback, the
//!   tool dispatcher and the solving loop
//! - `tools` - Collaborators the agent can call (navigation, transcription,
//!   vision, Python execution, answer submission)
//! - `cli` - Command line and HTTP front door
//!
//! # Example
//!
//! ```rust,no_run
//! use quizbot::agent::Agent;
//! use quizbot::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let agent = Agent::from_settings(&settings)?;
//!
//!     let outcome = agent
//!         .solve("https://quiz.example.com/start", "me@example.com", "s3cret")
//!         .await;
//!     println!("Session ended: {}", outcome);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod tools;

pub use error::{QuizError, Result};
