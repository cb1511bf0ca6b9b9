//! OpenAI-compatible client configuration.

use crate::config::ModelSettings;
use crate::error::{QuizError, Result};
use async_openai::{config::OpenAIConfig, Client};
use backoff::exponential::ExponentialBackoffBuilder;
use backoff::ExponentialBackoff;
use std::time::Duration;

/// Transport-level timeout for a single API request (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client for the configured API base, reading the key from the environment.
pub fn create_client(settings: &ModelSettings) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(settings, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client with a custom transport timeout.
pub fn create_client_with_timeout(
    settings: &ModelSettings,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let api_key = api_key(settings)?;
    build_client(&settings.api_base, api_key, timeout)
}

/// Build a client for `api_base`.
///
/// Rate-limited requests are not retried: a 429 comes back as an
/// `OpenAIError::ApiError` from the first attempt.
pub(crate) fn build_client(
    api_base: &str,
    api_key: String,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(api_key);

    let no_retry: ExponentialBackoff = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry))
}

/// Read the API key named by `api_key_env`.
pub fn api_key(settings: &ModelSettings) -> Result<String> {
    match std::env::var(&settings.api_key_env) {
        Ok(key) if !key.is_empty() => Ok(key),
        Ok(_) => Err(QuizError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            settings.api_key_env, settings.api_key_env
        ))),
        Err(_) => Err(QuizError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            settings.api_key_env, settings.api_key_env
        ))),
    }
}

/// Check if the API key is configured.
pub fn is_api_key_configured(settings: &ModelSettings) -> bool {
    api_key(settings).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let settings = ModelSettings {
            api_key_env: "QUIZBOT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ModelSettings::default()
        };
        assert!(!is_api_key_configured(&settings));
        assert!(matches!(create_client(&settings), Err(QuizError::Config(_))));
    }
}
