//! Configuration module for quizbot.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    AgentSettings, GeneralSettings, HostFix, ModelSettings, PromptSettings, ServerSettings,
    Settings, ToolSettings,
};
