//! Error types for the attune turn pipeline.

/// Top-level error type for the voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum AttuneError {
    /// Microphone / recording device failure.
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech-to-text backend failure.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Emotion detection failure (only raised when no input was supplied).
    #[error("emotion detection error: {0}")]
    EmotionDetection(String),

    /// Language model failure.
    #[error("generation error: {0}")]
    Generation(String),

    /// History store read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Malformed or missing session identifier.
    ///
    /// This indicates a caller bug and is propagated rather than folded into
    /// the session status.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// No session with this identifier has been opened.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A turn is already in flight for this session.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// A stage was triggered out of order.
    #[error("invalid transition: {stage} requires phase {expected}, session is {actual}")]
    InvalidTransition {
        stage: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// Speech synthesis or playback failure.
    #[error("speech error: {0}")]
    Speech(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttuneError {
    /// The underlying failure message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Capture(m)
            | Self::Transcription(m)
            | Self::EmotionDetection(m)
            | Self::Generation(m)
            | Self::Persistence(m)
            | Self::InvalidSession(m)
            | Self::SessionNotFound(m)
            | Self::SessionBusy(m)
            | Self::Speech(m)
            | Self::Config(m) => m.clone(),
            Self::Io(e) => e.to_string(),
            Self::InvalidTransition { .. } => self.to_string(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AttuneError>;
