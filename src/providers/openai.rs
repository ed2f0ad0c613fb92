//! OpenAI provider
//!
//! Implements `SpeechToText` with the Whisper transcription endpoint and `TextGenerator`
//! with chat completions.

use std::path::Path;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, SpeechToText, TextGenerator};
use crate::config::ProviderConfig;

/// Instruction sent with every paraphrase request
pub const PARAPHRASE_SYSTEM_PROMPT: &str = "You are a helpful assistant that paraphrases text \
to make it more clear and concise while preserving the original meaning.";

/// OpenAI client shared by both provider traits
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    /// Create a provider whose HTTP client enforces the configured timeout
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        if !self.config.is_configured() {
            return Err(ProviderError::NotConfigured);
        }
        Ok(self.config.api_key.as_deref().unwrap_or_default())
    }

    fn stt_url(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url)
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

/// Whisper transcription response
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI API error body
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Turn a non-success response into `ProviderError::Api`
async fn api_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    ProviderError::Api { status, message }
}

/// MIME type the transcription endpoint expects for a file extension
fn audio_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("mp4") => "audio/mp4",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl SpeechToText for OpenAiProvider {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn transcribe(&self, audio_file: &Path) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let file_name = audio_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let data = tokio::fs::read(audio_file).await?;
        debug!("Sending {} bytes to {}", data.len(), self.stt_url());

        let part = Part::bytes(data)
            .file_name(file_name.clone())
            .mime_str(audio_mime_type(&file_name))?;
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .text("response_format", "json")
            .part("file", part);

        let response = self
            .client
            .post(self.stt_url())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn paraphrase(&self, text: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let request = ChatRequest {
            model: &self.config.paraphrase_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: PARAPHRASE_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Please paraphrase this text: {}", text),
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("no completion returned".to_string()))
    }
}
