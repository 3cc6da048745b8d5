//! Per-session turn state threaded through the pipeline stages.

use super::SessionId;
use crate::emotion::EmotionScore;
use crate::pipeline::stage::StageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Human-readable progress labels written to [`SessionState::status`].
pub mod status {
    pub const READY: &str = "🎤 Ready to Listen";
    pub const LISTENING: &str = "🎤 Listening...";
    pub const RECORDING: &str = "🎙️ Recording...";
    pub const TRANSCRIBING: &str = "🔍 Transcribing...";
    pub const TRANSCRIBED: &str = "📝 Transcription ready";
    pub const DETECTING_EMOTION: &str = "😶 Detecting Emotion...";
    pub const GENERATING: &str = "💬 Generating Response...";
    pub const COMPLETE: &str = "✅ Complete!";
}

/// Where a session is within its current turn.
///
/// `Idle` is both the initial and the only terminal phase; success and
/// failure are told apart by the status text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Recording,
    Transcribing,
    DetectingEmotion,
    Generating,
}

impl TurnPhase {
    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::DetectingEmotion => "detecting_emotion",
            Self::Generating => "generating",
        }
    }

    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// Emotion selected for the in-flight turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEmotion {
    /// Lower-case classifier label, e.g. `happy`.
    pub label: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Label with rounded percentage, e.g. `happy (82%)`.
    pub display: String,
}

impl DetectedEmotion {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        let label = label.into();
        let display = emotion_display(&label, confidence);
        Self {
            label,
            confidence,
            display,
        }
    }
}

impl From<EmotionScore> for DetectedEmotion {
    fn from(score: EmotionScore) -> Self {
        Self::new(score.label, score.confidence)
    }
}

/// `round(confidence * 100)`, clamped to `0..=100`.
pub fn confidence_percent(confidence: f32) -> u32 {
    if !confidence.is_finite() {
        return 0;
    }
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Display string combining label and rounded confidence percentage.
pub fn emotion_display(label: &str, confidence: f32) -> String {
    format!("{label} ({}%)", confidence_percent(confidence))
}

/// Mutable state of one conversation, passed into and returned from each
/// pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub phase: TurnPhase,
    /// The only externally observable progress signal.
    pub status: String,
    /// Set by Transcribe, cleared at the next Record.
    pub pending_transcript: Option<String>,
    /// Set by Detect Emotion, cleared at the next Record.
    pub pending_emotion: Option<DetectedEmotion>,
    /// Most recent generated reply.
    pub last_response: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    /// Fresh idle state for a newly opened session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: TurnPhase::Idle,
            status: status::READY.to_owned(),
            pending_transcript: None,
            pending_emotion: None,
            last_response: None,
            updated_at: Utc::now(),
        }
    }

    /// Move to `phase` with a new status label.
    pub fn transition(mut self, phase: TurnPhase, status: impl Into<String>) -> Self {
        self.phase = phase;
        self.status = status.into();
        self.updated_at = Utc::now();
        self
    }

    /// Begin a new turn: previous turn's pending data is superseded.
    pub fn start_turn(mut self) -> Self {
        self.pending_transcript = None;
        self.pending_emotion = None;
        self.transition(TurnPhase::Recording, status::LISTENING)
    }

    /// Fold a stage failure into this (pre-stage) state: back to idle with
    /// the failure explained in the status.
    pub fn fail(&self, error: &StageError) -> Self {
        self.clone().transition(TurnPhase::Idle, error.status_label())
    }

    /// True while a turn has started but not reached idle.
    pub fn is_in_flight(&self) -> bool {
        !self.phase.is_idle()
    }

    /// True when a turn has been in flight for longer than `max_age`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        if !self.is_in_flight() {
            return false;
        }
        let age = now.signed_duration_since(self.updated_at);
        age.to_std().map(|age| age > max_age).unwrap_or(false)
    }
}
