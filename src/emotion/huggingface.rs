//! Emotion classifiers backed by the Hugging Face inference API.
//!
//! Both endpoints live at `{base_url}/models/{model}`. Text is posted as
//! `{"inputs": "..."}`; audio as raw WAV bytes. Responses are lists of
//! `{label, score}`, sometimes nested one level deep.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{EmotionScore, SpeechEmotionClassifier, TextEmotionClassifier};
use crate::api_client::{ApiClient, send_checked};
use crate::audio::AudioArtifact;
use crate::config::{EmotionConfig, api_key_from_env};
use crate::error::{AttuneError, Result};

/// Confidence reported when the text model returns nothing.
const EMPTY_TEXT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationResponse {
    fn top(self) -> Option<LabelScore> {
        let all: Vec<LabelScore> = match self {
            Self::Nested(groups) => groups.into_iter().flatten().collect(),
            Self::Flat(items) => items,
        };
        all.into_iter().max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

async fn classify_request(request: reqwest::RequestBuilder, what: &str) -> Result<Option<LabelScore>> {
    let response = send_checked(request, what, AttuneError::EmotionDetection).await?;
    let parsed: ClassificationResponse = response
        .json()
        .await
        .map_err(|e| AttuneError::EmotionDetection(format!("{what} response parse error: {e}")))?;
    Ok(parsed.top())
}

fn build_client(config: &EmotionConfig) -> Result<ApiClient> {
    ApiClient::new(
        config.base_url.clone(),
        api_key_from_env(&config.api_key_env),
        std::time::Duration::from_secs(config.timeout_secs),
    )
}

/// Text emotion classifier.
#[derive(Debug, Clone)]
pub struct HfTextEmotionClassifier {
    api: ApiClient,
    model: String,
}

impl HfTextEmotionClassifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &EmotionConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(config)?, config.text_model.clone()))
    }

    pub fn with_client(api: ApiClient, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextEmotionClassifier for HfTextEmotionClassifier {
    async fn classify(&self, text: &str) -> Result<EmotionScore> {
        if text.trim().is_empty() {
            return Ok(EmotionScore::neutral(EMPTY_TEXT_CONFIDENCE));
        }
        let request = self
            .api
            .post(&format!("/models/{}", self.model))
            .json(&serde_json::json!({ "inputs": text }));
        let top = classify_request(request, "text emotion").await?;
        debug!(model = %self.model, ?top, "text emotion classified");
        Ok(match top {
            Some(t) => EmotionScore::new(t.label, t.score),
            None => EmotionScore::neutral(EMPTY_TEXT_CONFIDENCE),
        })
    }
}

/// Speech emotion classifier.
#[derive(Debug, Clone)]
pub struct HfSpeechEmotionClassifier {
    api: ApiClient,
    model: String,
}

impl HfSpeechEmotionClassifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &EmotionConfig) -> Result<Self> {
        Ok(Self::with_client(build_client(config)?, config.audio_model.clone()))
    }

    pub fn with_client(api: ApiClient, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechEmotionClassifier for HfSpeechEmotionClassifier {
    async fn classify(&self, audio: &AudioArtifact) -> Result<EmotionScore> {
        let bytes = audio.read_bytes().map_err(|e| {
            AttuneError::EmotionDetection(format!("cannot read recording: {}", e.detail()))
        })?;
        let request = self
            .api
            .post(&format!("/models/{}", self.model))
            .header("Content-Type", "audio/wav")
            .body(bytes);
        let top = classify_request(request, "speech emotion").await?;
        debug!(model = %self.model, ?top, "speech emotion classified");
        top.map(|t| EmotionScore::new(t.label, t.score))
            .ok_or_else(|| AttuneError::EmotionDetection("speech classifier returned no labels".into()))
    }
}
