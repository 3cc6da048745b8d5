//! Emotion detection from the spoken audio and its transcript.
//!
//! Two independent classifiers each produce a top label with a confidence.
//! [`FusedEmotionDetector`] runs both, treats a failing modality as absent,
//! and keeps the more confident result. Ties go to the text signal.

pub mod huggingface;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::AudioArtifact;
use crate::error::{AttuneError, Result};

pub use huggingface::{HfSpeechEmotionClassifier, HfTextEmotionClassifier};

/// Label used when no modality produced a usable result.
pub const NEUTRAL: &str = "neutral";

/// A classifier's top label and its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    /// In `0.0..=1.0`.
    pub confidence: f32,
}

impl EmotionScore {
    /// Lower-cases the label and clamps the confidence into range.
    pub fn new(label: impl AsRef<str>, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label: label.as_ref().trim().to_lowercase(),
            confidence,
        }
    }

    pub fn neutral(confidence: f32) -> Self {
        Self::new(NEUTRAL, confidence)
    }
}

/// Infers the speaker's emotion for one turn.
#[async_trait]
pub trait EmotionDetector: Send + Sync {
    /// Classify whichever inputs are present.
    ///
    /// # Errors
    ///
    /// Fails with [`AttuneError::EmotionDetection`] only when neither input
    /// is supplied; individual modality failures degrade to absent.
    async fn detect(&self, audio: Option<&AudioArtifact>, text: Option<&str>)
    -> Result<EmotionScore>;
}

/// Classifies emotion from text.
#[async_trait]
pub trait TextEmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<EmotionScore>;
}

/// Classifies emotion from recorded speech.
#[async_trait]
pub trait SpeechEmotionClassifier: Send + Sync {
    async fn classify(&self, audio: &AudioArtifact) -> Result<EmotionScore>;
}

/// Pick the more confident signal; text wins ties. Both absent is neutral at 0.
pub fn select_emotion(text: Option<EmotionScore>, audio: Option<EmotionScore>) -> EmotionScore {
    match (text, audio) {
        (Some(t), Some(a)) => {
            if t.confidence >= a.confidence {
                t
            } else {
                a
            }
        }
        (Some(t), None) => t,
        (None, Some(a)) => a,
        (None, None) => EmotionScore::neutral(0.0),
    }
}

/// Runs a text and a speech classifier and fuses their answers.
pub struct FusedEmotionDetector {
    text: Arc<dyn TextEmotionClassifier>,
    speech: Arc<dyn SpeechEmotionClassifier>,
}

impl FusedEmotionDetector {
    pub fn new(
        text: Arc<dyn TextEmotionClassifier>,
        speech: Arc<dyn SpeechEmotionClassifier>,
    ) -> Self {
        Self { text, speech }
    }
}

#[async_trait]
impl EmotionDetector for FusedEmotionDetector {
    async fn detect(
        &self,
        audio: Option<&AudioArtifact>,
        text: Option<&str>,
    ) -> Result<EmotionScore> {
        if audio.is_none() && text.is_none() {
            return Err(AttuneError::EmotionDetection(
                "no audio or transcript to classify".into(),
            ));
        }

        let text_score = match text {
            Some(t) => match self.text.classify(t).await {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("text emotion classifier failed, ignoring: {e}");
                    None
                }
            },
            None => None,
        };

        let audio_score = match audio {
            Some(a) => match self.speech.classify(a).await {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("speech emotion classifier failed, ignoring: {e}");
                    None
                }
            },
            None => None,
        };

        debug!(?text_score, ?audio_score, "emotion candidates");
        Ok(select_emotion(text_score, audio_score))
    }
}
