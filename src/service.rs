//! Session-aware entry point over the turn pipeline.
//!
//! [`AssistantService`] validates session ids, enforces one running stage
//! per session and the stage ordering, and publishes every state change
//! into the session registry so it can be polled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AttuneError, Result};
use crate::history::{self, DisplayTurn};
use crate::pipeline::{Stage, TurnPipeline};
use crate::session::{SessionId, SessionRegistry, SessionSlot, SessionState, TurnPhase};

/// Default age after which an unfinished turn may be restarted.
const DEFAULT_STALE_TURN: Duration = Duration::from_secs(300);

/// Externally visible view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub phase: TurnPhase,
    pub status: String,
    /// Display form of the pending emotion, e.g. `happy (82%)`.
    pub emotion: Option<String>,
    pub last_response: Option<String>,
    pub chat_history: Vec<DisplayTurn>,
}

/// Result of a stage trigger.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    /// State after the stage (idle with an error status on failure).
    pub state: SessionState,
    /// Stage to trigger next, or `None` when the turn has ended.
    pub next: Option<Stage>,
}

impl TriggerOutcome {
    /// True when the stage ended the turn with an error status.
    pub fn failed(&self) -> bool {
        self.next.is_none() && self.state.status.starts_with("❌")
    }
}

/// A stored conversation and its preview text.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub preview: String,
}

/// Puts a session back to its pre-stage state if a trigger is dropped
/// before the stage finishes.
///
/// Stages publish intermediate phases while they await external calls; a
/// cancelled trigger would otherwise leave the session parked in one of
/// them with nobody running it.
struct RestoreOnCancel<'a> {
    slot: &'a SessionSlot,
    before: Option<SessionState>,
}

impl<'a> RestoreOnCancel<'a> {
    fn arm(slot: &'a SessionSlot, before: &SessionState) -> Self {
        Self {
            slot,
            before: Some(before.clone()),
        }
    }

    fn disarm(mut self) {
        self.before = None;
    }
}

impl Drop for RestoreOnCancel<'_> {
    fn drop(&mut self) {
        if let Some(before) = self.before.take() {
            warn!(
                session_id = %before.session_id,
                phase = before.phase.as_str(),
                "stage cancelled, session restored"
            );
            self.slot.store(before);
        }
    }
}

/// Runs turns for many independent sessions.
pub struct AssistantService {
    registry: SessionRegistry,
    pipeline: Arc<TurnPipeline>,
    stale_after: Duration,
}

impl AssistantService {
    pub fn new(pipeline: TurnPipeline) -> Self {
        Self {
            registry: SessionRegistry::new(),
            pipeline: Arc::new(pipeline),
            stale_after: DEFAULT_STALE_TURN,
        }
    }

    /// Age after which an in-flight turn counts as abandoned.
    pub fn with_stale_turn_after(mut self, after: Duration) -> Self {
        self.stale_after = after;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &TurnPipeline {
        &self.pipeline
    }

    /// Open a session, generating an id unless one is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::InvalidSession`] for a malformed id.
    pub async fn open_session(&self, requested: Option<&str>) -> Result<SessionId> {
        let id = match requested {
            Some(raw) => SessionId::parse(raw)?,
            None => SessionId::generate(),
        };
        self.registry.open(&id).await;
        info!(session_id = %id, "session opened");
        Ok(id)
    }

    /// Current state and formatted history.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::InvalidSession`] for a malformed id and
    /// [`AttuneError::SessionNotFound`] for a session that is neither open
    /// nor has stored history.
    pub async fn snapshot(&self, raw_id: &str) -> Result<SessionView> {
        let id = SessionId::parse(raw_id)?;
        let slot = self.resolve(&id).await?;
        let state = slot.snapshot();
        let messages = self.pipeline.history().read(&id).await?;
        Ok(SessionView {
            session_id: id,
            phase: state.phase,
            status: state.status,
            emotion: state.pending_emotion.map(|e| e.display),
            last_response: state.last_response,
            chat_history: history::format_chat_history(&messages),
        })
    }

    /// Full formatted history for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::InvalidSession`] for a malformed id rather
    /// than an empty history.
    pub async fn history(&self, raw_id: &str) -> Result<Vec<DisplayTurn>> {
        let id = SessionId::parse(raw_id)?;
        let messages = self.pipeline.history().read(&id).await?;
        Ok(history::format_chat_history(&messages))
    }

    /// The most recent completed exchange for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::InvalidSession`] for a malformed id.
    pub async fn latest_turn(&self, raw_id: &str) -> Result<Option<DisplayTurn>> {
        let id = SessionId::parse(raw_id)?;
        let messages = self.pipeline.history().read(&id).await?;
        Ok(history::latest_turn(&messages))
    }

    /// Every stored session with a short preview.
    ///
    /// # Errors
    ///
    /// Propagates history store failures.
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let store = self.pipeline.history();
        let mut summaries = Vec::new();
        for session_id in store.list_sessions().await? {
            let messages = store.read(&session_id).await?;
            let preview = history::session_preview(&session_id, &messages);
            summaries.push(SessionSummary {
                session_id,
                preview,
            });
        }
        Ok(summaries)
    }

    /// Trigger one stage for a session.
    ///
    /// A stage failure is not an error here: it is folded into the
    /// returned state's status.
    ///
    /// # Errors
    ///
    /// - [`AttuneError::InvalidSession`] for a malformed id
    /// - [`AttuneError::SessionNotFound`] for an unknown session
    /// - [`AttuneError::SessionBusy`] if a stage is already running, or a
    ///   record is triggered while a recent turn is unfinished
    /// - [`AttuneError::InvalidTransition`] if the session is not waiting
    ///   on `stage`; state is left untouched
    pub async fn trigger(&self, raw_id: &str, stage: Stage) -> Result<TriggerOutcome> {
        let id = SessionId::parse(raw_id)?;
        let slot = self.resolve(&id).await?;
        let _turn = slot.try_begin()?;
        let current = slot.snapshot();
        self.check_ready(&current, stage)?;

        let restore = RestoreOnCancel::arm(&slot, &current);
        let publish = |s: &SessionState| slot.store(s.clone());
        let outcome = match self.pipeline.run(stage, &current, &publish).await {
            Ok(state) => TriggerOutcome {
                state,
                next: stage.next(),
            },
            Err(e) => TriggerOutcome {
                state: current.fail(&e),
                next: None,
            },
        };
        slot.store(outcome.state.clone());
        restore.disarm();
        Ok(outcome)
    }

    /// Run a whole turn, reporting each state change to `on_progress`.
    ///
    /// # Errors
    ///
    /// Same admission errors as a record trigger; stage failures end the
    /// turn and are reported in the returned status.
    pub async fn run_turn(
        &self,
        id: &SessionId,
        on_progress: &(dyn Fn(&SessionState) + Send + Sync),
    ) -> Result<SessionState> {
        let slot = self.registry.open(id).await;
        let _turn = slot.try_begin()?;
        let current = slot.snapshot();
        self.check_ready(&current, Stage::Record)?;

        let restore = RestoreOnCancel::arm(&slot, &current);
        let publish = |s: &SessionState| {
            slot.store(s.clone());
            on_progress(s);
        };
        let finished = self.pipeline.run_turn(&current, &publish).await;
        slot.store(finished.clone());
        restore.disarm();
        Ok(finished)
    }

    /// Slot for an open session, restoring one that only exists in history.
    async fn resolve(&self, id: &SessionId) -> Result<Arc<SessionSlot>> {
        match self.registry.get(id).await {
            Ok(slot) => Ok(slot),
            Err(AttuneError::SessionNotFound(_)) => {
                if self.pipeline.history().read(id).await?.is_empty() {
                    Err(AttuneError::SessionNotFound(id.to_string()))
                } else {
                    info!(session_id = %id, "restoring session from history");
                    Ok(self.registry.open(id).await)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn check_ready(&self, current: &SessionState, stage: Stage) -> Result<()> {
        if stage == Stage::Record {
            if current.is_in_flight() {
                if current.is_stale(self.stale_after, Utc::now()) {
                    warn!(
                        session_id = %current.session_id,
                        phase = current.phase.as_str(),
                        "abandoned turn reset by new recording"
                    );
                } else {
                    return Err(AttuneError::SessionBusy(format!(
                        "session {} is mid-turn ({})",
                        current.session_id,
                        current.phase.as_str()
                    )));
                }
            }
            return Ok(());
        }

        let expected = stage.required_phase();
        if current.phase != expected {
            return Err(AttuneError::InvalidTransition {
                stage: stage.as_str(),
                expected: expected.as_str(),
                actual: current.phase.as_str(),
            });
        }
        Ok(())
    }
}
