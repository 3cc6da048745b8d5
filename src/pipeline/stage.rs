//! The four externally-triggerable stages of a turn.

use std::fmt;

use crate::error::AttuneError;
use crate::session::TurnPhase;

/// One step of a turn, triggered independently by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Record,
    Transcribe,
    DetectEmotion,
    Generate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Record,
        Stage::Transcribe,
        Stage::DetectEmotion,
        Stage::Generate,
    ];

    /// Route-friendly name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Transcribe => "transcribe",
            Self::DetectEmotion => "emotion",
            Self::Generate => "generate",
        }
    }

    /// Phase a session must be in before this stage may run.
    pub fn required_phase(self) -> TurnPhase {
        match self {
            Self::Record => TurnPhase::Idle,
            Self::Transcribe => TurnPhase::Recording,
            Self::DetectEmotion => TurnPhase::DetectingEmotion,
            Self::Generate => TurnPhase::Generating,
        }
    }

    /// The stage that naturally follows this one within a turn.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Record => Some(Self::Transcribe),
            Self::Transcribe => Some(Self::DetectEmotion),
            Self::DetectEmotion => Some(Self::Generate),
            Self::Generate => None,
        }
    }

    /// Noun used in user-facing failure labels.
    fn error_context(self) -> &'static str {
        match self {
            Self::Record => "recording",
            Self::Transcribe => "transcription",
            Self::DetectEmotion => "emotion detection",
            Self::Generate => "response generation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = AttuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| AttuneError::Config(format!("unknown stage: {s}")))
    }
}

/// A failure inside a stage, tagged with the stage that raised it.
///
/// Stage failures never escape to the caller as errors; they are folded
/// into the session status via [`crate::session::SessionState::fail`].
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub source: AttuneError,
}

impl StageError {
    pub fn new(stage: Stage, source: AttuneError) -> Self {
        Self { stage, source }
    }

    /// Status text shown to the user, e.g.
    /// `❌ Error during transcription: device busy`.
    pub fn status_label(&self) -> String {
        format!(
            "❌ Error during {}: {}",
            self.stage.error_context(),
            self.source.detail()
        )
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
