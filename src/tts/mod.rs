//! Spoken replies.
//!
//! Speaking is best effort: the pipeline logs a [`Speaker`] failure and
//! carries on. The detected emotion only affects the speaking rate.

pub mod api;

use async_trait::async_trait;

use crate::error::Result;

pub use api::ApiSpeaker;

/// Rate used for labels outside the table, in words per minute.
pub const DEFAULT_RATE_WPM: u32 = 150;

/// Speaks a reply aloud.
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text` in a tone suited to `emotion`. Blocks until done.
    async fn speak(&self, text: &str, emotion: &str) -> Result<()>;
}

/// Speaking rate in words per minute for an emotion label.
///
/// Case-insensitive. Only the five listed labels change the rate; any
/// other label, including classifier nouns such as `joy`, speaks at
/// [`DEFAULT_RATE_WPM`].
pub fn speech_rate(emotion: &str) -> u32 {
    match emotion.trim().to_lowercase().as_str() {
        "happy" => 190,
        "sad" => 140,
        "angry" => 175,
        "surprised" => 200,
        "neutral" => 160,
        _ => DEFAULT_RATE_WPM,
    }
}

/// Playback speed multiplier relative to the default rate.
pub fn speed_for(emotion: &str) -> f32 {
    speech_rate(emotion) as f32 / DEFAULT_RATE_WPM as f32
}

/// A speaker that stays silent, for headless deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeaker;

#[async_trait]
impl Speaker for SilentSpeaker {
    async fn speak(&self, _text: &str, _emotion: &str) -> Result<()> {
        Ok(())
    }
}
