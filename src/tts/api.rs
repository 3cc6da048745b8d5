//! Speech synthesis through an OpenAI-compatible `/v1/audio/speech`
//! endpoint, played on the local output device.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Speaker, speed_for};
use crate::api_client::{ApiClient, send_checked};
use crate::audio::CpalPlayback;
use crate::audio::artifact::decode_wav_mono;
use crate::config::{TtsConfig, api_key_from_env};
use crate::error::{AttuneError, Result};

/// Remote TTS with local playback.
#[derive(Debug, Clone)]
pub struct ApiSpeaker {
    api: ApiClient,
    model: String,
    voice: String,
    output_device: Option<String>,
}

impl ApiSpeaker {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TtsConfig, output_device: Option<String>) -> Result<Self> {
        let api = ApiClient::new(
            config.base_url.clone(),
            api_key_from_env(&config.api_key_env),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(
            "TTS configured: {} model={} voice={}",
            api.base_url(),
            config.model,
            config.voice
        );
        Ok(Self {
            api,
            model: config.model.clone(),
            voice: config.voice.clone(),
            output_device,
        })
    }

    /// Fetch synthesized WAV bytes without playing them.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::Speech`] on transport or HTTP failure.
    pub async fn synthesize(&self, text: &str, emotion: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "wav",
            "speed": speed_for(emotion),
        });
        let request = self.api.post("/v1/audio/speech").json(&body);
        let response = send_checked(request, "speech synthesis", AttuneError::Speech).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttuneError::Speech(format!("speech body read failed: {e}")))?;
        debug!(bytes = bytes.len(), emotion, "speech synthesized");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Speaker for ApiSpeaker {
    async fn speak(&self, text: &str, emotion: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let wav = self.synthesize(text, emotion).await?;
        let (samples, sample_rate) = decode_wav_mono(&wav)?;
        let output_device = self.output_device.clone();
        tokio::task::spawn_blocking(move || {
            let playback = CpalPlayback::open(output_device.as_deref())?;
            playback.play(&samples, sample_rate)
        })
        .await
        .map_err(|e| AttuneError::Speech(format!("playback task failed: {e}")))?
    }
}
