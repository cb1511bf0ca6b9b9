//! Error types for quizbot.

use thiserror::Error;

/// Library-level error type for quizbot operations.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model {model} is rate limited: {message}")]
    RateLimited { model: String, message: String },

    #[error("Model {model} is unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("All {tried} configured models are exhausted")]
    AllModelsExhausted { tried: usize },

    #[error("Model API error: {0}")]
    OpenAI(String),

    #[error("Malformed decision: {0}")]
    MalformedDecision(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Image analysis failed: {0}")]
    Vision(String),

    #[error("Code execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),
}

impl QuizError {
    /// Whether the model client should move on to the next model.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            QuizError::RateLimited { .. } | QuizError::ModelUnavailable { .. }
        )
    }

    /// Whether this error ends the session instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QuizError::AllModelsExhausted { .. } | QuizError::Config(_)
        )
    }
}

/// Result type alias for quizbot operations.
pub type Result<T> = std::result::Result<T, QuizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_classification() {
        let limited = QuizError::RateLimited {
            model: "a".to_string(),
            message: "slow down".to_string(),
        };
        assert!(limited.is_fallback_eligible());
        assert!(!limited.is_fatal());

        let other = QuizError::OpenAI("invalid api key".to_string());
        assert!(!other.is_fallback_eligible());
        assert!(!other.is_fatal());

        assert!(QuizError::AllModelsExhausted { tried: 3 }.is_fatal());
    }
}
