//! In-process registry of open sessions.
//!
//! Each session owns a [`SessionSlot`]: the latest published
//! [`SessionState`] plus a single-flight turn guard. The state cell is
//! readable at any time (so progress can be polled mid-stage) while the
//! guard is held for the whole duration of a stage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedMutexGuard, RwLock};

use super::{SessionId, SessionState};
use crate::error::{AttuneError, Result};

/// State cell and turn guard for one session.
#[derive(Debug)]
pub struct SessionSlot {
    state: Mutex<SessionState>,
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl SessionSlot {
    fn new(id: SessionId) -> Self {
        Self {
            state: Mutex::new(SessionState::new(id)),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Copy of the most recently published state.
    pub fn snapshot(&self) -> SessionState {
        match self.state.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Publish a new state.
    pub fn store(&self, next: SessionState) {
        match self.state.lock() {
            Ok(mut s) => *s = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Claim the turn guard without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::SessionBusy`] if another trigger for this
    /// session is still executing.
    pub fn try_begin(&self) -> Result<OwnedMutexGuard<()>> {
        Arc::clone(&self.turn).try_lock_owned().map_err(|_| {
            AttuneError::SessionBusy(format!(
                "a stage is already running for session {}",
                self.snapshot().session_id
            ))
        })
    }
}

/// Registry of open sessions, keyed by id.
///
/// Cheaply cloneable; clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<RwLock<HashMap<SessionId, Arc<SessionSlot>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the slot for `id`, creating an idle session on first contact.
    pub async fn open(&self, id: &SessionId) -> Arc<SessionSlot> {
        if let Some(slot) = self.slots.read().await.get(id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(id.clone())
                .or_insert_with(|| Arc::new(SessionSlot::new(id.clone()))),
        )
    }

    /// Look up an already-open session.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::SessionNotFound`] if `id` was never opened.
    pub async fn get(&self, id: &SessionId) -> Result<Arc<SessionSlot>> {
        self.slots
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AttuneError::SessionNotFound(id.to_string()))
    }
}
