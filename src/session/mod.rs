//! Conversation sessions: identifiers, per-session state, and the registry
//! that serialises turns within a session.

pub mod registry;
pub mod state;

use crate::error::{AttuneError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use registry::{SessionRegistry, SessionSlot};
pub use state::{DetectedEmotion, SessionState, TurnPhase};

/// Longest identifier accepted from a caller.
const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque, stable identifier for one conversation.
///
/// Identifiers double as artifact filenames, so only ASCII alphanumerics,
/// `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::InvalidSession`] for empty, oversized, or
    /// non-filename-safe identifiers.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(AttuneError::InvalidSession(
                "session id must not be empty".into(),
            ));
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(AttuneError::InvalidSession(format!(
                "session id longer than {MAX_SESSION_ID_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AttuneError::InvalidSession(format!(
                "session id contains invalid characters: {raw:?}"
            )));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First six characters, used when a session has no preview text.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(6) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = AttuneError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
