//! Audio download and Whisper transcription.

use super::Transcriber;
use crate::config::ToolSettings;
use crate::error::{QuizError, Result};
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Whisper-based transcriber for audio clips linked from quiz pages.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    model: String,
    base_url: String,
    min_audio_bytes: usize,
    timeout: Duration,
}

impl WhisperTranscriber {
    pub fn new(client: Client<OpenAIConfig>, settings: &ToolSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.fetch_timeout())
            .build()?;

        Ok(Self {
            client,
            http,
            model: settings.transcription_model.clone(),
            base_url: settings.base_url.clone(),
            min_audio_bytes: settings.min_audio_bytes,
            timeout: settings.fetch_timeout(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::Transcription(format!(
                "Failed to download audio (Status {})",
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.len() < self.min_audio_bytes {
            return Err(QuizError::Transcription(format!(
                "Downloaded file is too small ({} bytes). It might not be audio.",
                bytes.len()
            )));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self))]
    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        let url = resolve_audio_url(&self.base_url, audio_url)?;
        info!("Transcribing {}", url);

        let bytes = self.download(&url).await?;
        debug!("Downloaded {} bytes of audio", bytes.len());

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(audio_file_name(&url), bytes))
            .model(&self.model)
            .response_format(AudioResponseFormat::Json)
            .language("en")
            .temperature(0.0)
            .build()
            .map_err(|e| QuizError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.audio().transcribe(request))
            .await
            .map_err(|_| {
                QuizError::Transcription(format!("Timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| QuizError::OpenAI(format!("Whisper API error: {}", e)))?;

        Ok(format!("TRANSCRIPTION: {}", response.text.trim()))
    }
}

/// Resolve host-relative audio URLs against the quiz host.
fn resolve_audio_url(base_url: &str, audio_url: &str) -> Result<String> {
    let audio_url = audio_url.trim();
    if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
        return Ok(audio_url.to_string());
    }

    let base = Url::parse(base_url)
        .map_err(|e| QuizError::Config(format!("Invalid tools.base_url {}: {}", base_url, e)))?;
    base.join(audio_url)
        .map(|u| u.to_string())
        .map_err(|e| QuizError::Transcription(format!("Invalid audio URL {}: {}", audio_url, e)))
}

/// File name with an extension the transcription API accepts.
fn audio_file_name(url: &str) -> String {
    let lower = url.to_lowercase();
    let ext = ["ogg", "opus", "wav", "flac", "m4a", "webm", "mp4"]
        .into_iter()
        .find(|ext| lower.contains(&format!(".{}", ext)))
        .unwrap_or("mp3");
    format!("audio.{}", ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_audio_url_resolved_against_base() {
        let url = resolve_audio_url("https://quiz.example.com", "/media/clip.mp3").unwrap();
        assert_eq!(url, "https://quiz.example.com/media/clip.mp3");
    }

    #[test]
    fn test_absolute_audio_url_untouched() {
        let url = resolve_audio_url("https://quiz.example.com", "https://cdn.example.org/a.wav").unwrap();
        assert_eq!(url, "https://cdn.example.org/a.wav");
    }

    #[test]
    fn test_audio_file_name_extension() {
        assert_eq!(audio_file_name("https://x/clip.OGG"), "audio.ogg");
        assert_eq!(audio_file_name("https://x/clip.wav?token=1"), "audio.wav");
        assert_eq!(audio_file_name("https://x/stream"), "audio.mp3");
    }
}
