//! Transcription through an OpenAI-compatible `/v1/audio/transcriptions`
//! endpoint (Groq, OpenAI, or a local whisper server).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;

use super::Transcriber;
use crate::api_client::{ApiClient, send_checked};
use crate::audio::AudioArtifact;
use crate::config::{SttConfig, api_key_from_env};
use crate::error::{AttuneError, Result};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper transcription over HTTP.
#[derive(Debug, Clone)]
pub struct WhisperApiTranscriber {
    api: ApiClient,
    model: String,
}

impl WhisperApiTranscriber {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SttConfig) -> Result<Self> {
        let api = ApiClient::new(
            config.base_url.clone(),
            api_key_from_env(&config.api_key_env),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!("STT configured: {} model={}", api.base_url(), config.model);
        Ok(Self::with_client(api, config.model.clone()))
    }

    pub fn with_client(api: ApiClient, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String> {
        let bytes = audio.read_bytes().map_err(|e| {
            AttuneError::Transcription(format!("cannot read recording: {}", e.detail()))
        })?;
        let file_name = audio
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_owned();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| AttuneError::Transcription(format!("invalid upload: {e}")))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part);

        let start = Instant::now();
        let request = self.api.post("/v1/audio/transcriptions").multipart(form);
        let response = send_checked(request, "transcription", AttuneError::Transcription).await?;
        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AttuneError::Transcription(format!("response parse error: {e}")))?;

        let text = parsed.text.trim().to_owned();
        info!(
            chars = text.len(),
            "transcribed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(text)
    }
}
