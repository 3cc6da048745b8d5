//! Speech-to-text.

pub mod whisper_api;

use async_trait::async_trait;

use crate::audio::AudioArtifact;
use crate::error::Result;

pub use whisper_api::WhisperApiTranscriber;

/// Turns a recorded artifact into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// # Errors
    ///
    /// Fails with [`crate::error::AttuneError::Transcription`]. Never retries.
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String>;
}
