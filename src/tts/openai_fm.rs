//! HTTP backend for the openai.fm speech endpoint.

use crate::error::{BookvoiceError, Result};
use crate::tts::backend::{AudioMime, SpeechBackend, Take};
use std::time::Duration;

const USER_AGENT: &str = concat!("bookvoice/", env!("CARGO_PKG_VERSION"));

/// Speech backend posting multipart forms to an openai.fm-compatible endpoint.
pub struct OpenAiFmBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiFmBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(text: &str, voice: &str, style_prompt: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new()
            .text("input", text.to_string())
            .text("prompt", style_prompt.to_string())
            .text("voice", voice.to_lowercase())
            .text("vibe", "null")
    }
}

#[async_trait::async_trait]
impl SpeechBackend for OpenAiFmBackend {
    async fn generate(&self, text: &str, voice: &str, style_prompt: &str) -> Result<Take> {
        tracing::debug!(
            endpoint = %self.endpoint,
            voice = voice,
            text_length = text.chars().count(),
            "Requesting speech"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(Self::form(text, voice, style_prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookvoiceError::Synthesis {
                message: format!("endpoint returned status {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mime = AudioMime::from_content_type(&content_type)?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(BookvoiceError::Synthesis {
                message: "endpoint returned an empty body".to_string(),
            });
        }

        tracing::debug!(
            voice = voice,
            bytes = bytes.len(),
            content_type = %content_type,
            "Speech received"
        );

        Ok(Take {
            bytes: bytes.to_vec(),
            mime,
        })
    }

    fn name(&self) -> &str {
        "openai.fm"
    }
}
