//! Image analysis through a vision-capable chat model.

use super::ImageAnalyzer;
use crate::config::ToolSettings;
use crate::error::{QuizError, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub struct VisionAnalyzer {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    model: String,
    timeout: Duration,
}

impl VisionAnalyzer {
    pub fn new(client: Client<OpenAIConfig>, settings: &ToolSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.fetch_timeout())
            .build()?;

        Ok(Self {
            client,
            http,
            model: settings.vision_model.clone(),
            timeout: settings.fetch_timeout(),
        })
    }

    /// Download an image and encode it as a data URL.
    async fn fetch_data_url(&self, image_url: &str) -> Result<String> {
        let response = self.http.get(image_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::Vision(format!(
                "Could not download image (Status {})",
                status.as_u16()
            )));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes of {}", bytes.len(), mime);

        Ok(data_url(&mime, &bytes))
    }
}

#[async_trait]
impl ImageAnalyzer for VisionAnalyzer {
    #[instrument(skip(self))]
    async fn analyze(&self, image_url: &str, question: &str) -> Result<String> {
        info!("Analyzing image {}", image_url);

        let data_url = self.fetch_data_url(image_url).await?;

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(question)
                .build()
                .map_err(|e| QuizError::Vision(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(data_url)
                        .build()
                        .map_err(|e| QuizError::Vision(e.to_string()))?,
                )
                .build()
                .map_err(|e| QuizError::Vision(e.to_string()))?
                .into(),
        ];

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()
                .map_err(|e| QuizError::Vision(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.1)
            .build()
            .map_err(|e| QuizError::Vision(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| QuizError::Vision(format!("Timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| QuizError::OpenAI(format!("Vision API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| QuizError::Vision("Empty response".to_string()))?;

        Ok(format!("IMAGE ANALYSIS: {}", content))
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
