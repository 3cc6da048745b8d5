//! The turn pipeline: record, transcribe, detect emotion, generate.
//!
//! Each stage takes the session state as it was when the stage was
//! triggered and returns the state it leaves behind. Progress labels are
//! pushed through a `publish` callback while the stage runs so that a
//! poller can watch the status change. A failed stage returns a
//! [`StageError`]; the caller folds it into the *input* state with
//! [`SessionState::fail`], so nothing a failed stage computed survives.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::context::build_context;
use super::stage::{Stage, StageError};
use crate::audio::{ArtifactStore, AudioRecorder};
use crate::config::LlmConfig;
use crate::emotion::{EmotionDetector, NEUTRAL};
use crate::history::{HistoryStore, NewMessage};
use crate::llm::ResponseGenerator;
use crate::session::state::status;
use crate::session::{DetectedEmotion, SessionState, TurnPhase};
use crate::stt::Transcriber;
use crate::tts::Speaker;

/// Default recording length.
const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(5);

/// Callback receiving intermediate states while a stage runs.
pub type Publish<'a> = &'a (dyn Fn(&SessionState) + Send + Sync);

/// A publish callback that discards updates.
pub fn no_publish(_: &SessionState) {}

/// The capabilities a turn needs.
#[derive(Clone)]
pub struct PipelinePorts {
    pub recorder: Arc<dyn AudioRecorder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub emotion: Arc<dyn EmotionDetector>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub speaker: Arc<dyn Speaker>,
    pub history: Arc<dyn HistoryStore>,
}

/// Executes the stages of a turn against injected capabilities.
pub struct TurnPipeline {
    ports: PipelinePorts,
    artifacts: ArtifactStore,
    record_duration: Duration,
    system_prompt: String,
}

impl TurnPipeline {
    pub fn new(ports: PipelinePorts, artifacts: ArtifactStore) -> Self {
        Self {
            ports,
            artifacts,
            record_duration: DEFAULT_RECORD_DURATION,
            system_prompt: LlmConfig::DEFAULT_SYSTEM_PROMPT.to_owned(),
        }
    }

    pub fn with_record_duration(mut self, duration: Duration) -> Self {
        self.record_duration = duration;
        self
    }

    /// Template containing `{emotion}`.
    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.ports.history
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Stage 1: start a fresh turn. Deletes any stale recording.
    ///
    /// # Errors
    ///
    /// Fails only if a leftover artifact cannot be removed.
    pub async fn begin_turn(&self, state: &SessionState) -> Result<SessionState, StageError> {
        let artifact = self.artifacts.artifact_for(&state.session_id);
        if artifact
            .delete()
            .map_err(|e| StageError::new(Stage::Record, e))?
        {
            debug!(session_id = %state.session_id, "removed stale recording");
        }
        info!(session_id = %state.session_id, "turn started");
        Ok(state.clone().start_turn())
    }

    /// Stage 2: capture audio, then transcribe it.
    ///
    /// # Errors
    ///
    /// Capture and transcription failures are both reported against
    /// [`Stage::Transcribe`].
    pub async fn transcribe(
        &self,
        state: &SessionState,
        publish: Publish<'_>,
    ) -> Result<SessionState, StageError> {
        let fail = |e| StageError::new(Stage::Transcribe, e);
        let artifact = self.artifacts.artifact_for(&state.session_id);

        let recording = state.clone().transition(TurnPhase::Recording, status::RECORDING);
        publish(&recording);
        self.ports
            .recorder
            .record(&artifact, self.record_duration)
            .await
            .map_err(fail)?;

        let transcribing = recording.transition(TurnPhase::Transcribing, status::TRANSCRIBING);
        publish(&transcribing);
        let text = self
            .ports
            .transcriber
            .transcribe(&artifact)
            .await
            .map_err(fail)?;

        info!(session_id = %state.session_id, chars = text.len(), "transcription complete");
        debug!(session_id = %state.session_id, transcript = %text);

        let mut next = transcribing.transition(TurnPhase::DetectingEmotion, status::TRANSCRIBED);
        next.pending_transcript = Some(text);
        Ok(next)
    }

    /// Stage 3: classify the emotion of the pending recording and transcript.
    ///
    /// # Errors
    ///
    /// Fails only if there is neither a recording nor a transcript.
    pub async fn detect_emotion(
        &self,
        state: &SessionState,
        publish: Publish<'_>,
    ) -> Result<SessionState, StageError> {
        let detecting = state
            .clone()
            .transition(TurnPhase::DetectingEmotion, status::DETECTING_EMOTION);
        publish(&detecting);

        let artifact = self.artifacts.artifact_for(&state.session_id);
        let audio = artifact.exists().then_some(&artifact);
        let score = self
            .ports
            .emotion
            .detect(audio, state.pending_transcript.as_deref())
            .await
            .map_err(|e| StageError::new(Stage::DetectEmotion, e))?;

        let emotion = DetectedEmotion::from(score);
        info!(session_id = %state.session_id, emotion = %emotion.display, "emotion detected");

        let mut next = detecting.transition(
            TurnPhase::Generating,
            format!("😶 Emotion detected: {}", emotion.display),
        );
        next.pending_emotion = Some(emotion);
        Ok(next)
    }

    /// Stage 4: generate, speak and persist the reply.
    ///
    /// # Errors
    ///
    /// Fails on history read, generation or persistence errors. Speaking
    /// failures are logged and ignored.
    pub async fn generate(
        &self,
        state: &SessionState,
        publish: Publish<'_>,
    ) -> Result<SessionState, StageError> {
        let fail = |e| StageError::new(Stage::Generate, e);
        let session_id = &state.session_id;

        let generating = state
            .clone()
            .transition(TurnPhase::Generating, status::GENERATING);
        publish(&generating);

        let transcript = state.pending_transcript.clone().ok_or_else(|| {
            fail(crate::error::AttuneError::Generation(
                "no transcript pending for this turn".into(),
            ))
        })?;
        let (label, display) = match &state.pending_emotion {
            Some(e) => (e.label.clone(), Some(e.display.clone())),
            None => (NEUTRAL.to_owned(), None),
        };

        let history = self.ports.history.read(session_id).await.map_err(fail)?;
        let context = build_context(&self.system_prompt, &label, &history, &transcript);
        let reply = self
            .ports
            .generator
            .generate(&context)
            .await
            .map_err(fail)?;

        if let Err(e) = self.ports.speaker.speak(&reply, &label).await {
            warn!(%session_id, "speaking reply failed, continuing: {e}");
        }

        self.ports
            .history
            .append_turn(
                NewMessage::user(session_id.clone(), transcript, display),
                NewMessage::assistant(session_id.clone(), reply.clone()),
            )
            .await
            .map_err(fail)?;

        let artifact = self.artifacts.artifact_for(session_id);
        if let Err(e) = artifact.delete() {
            warn!(%session_id, "failed to remove recording: {e}");
        }

        info!(%session_id, chars = reply.len(), "turn complete");
        let mut next = generating.transition(TurnPhase::Idle, status::COMPLETE);
        next.last_response = Some(reply);
        Ok(next)
    }

    /// Run a single stage.
    ///
    /// # Errors
    ///
    /// Returns the stage's [`StageError`] unchanged.
    pub async fn run(
        &self,
        stage: Stage,
        state: &SessionState,
        publish: Publish<'_>,
    ) -> Result<SessionState, StageError> {
        let result = match stage {
            Stage::Record => self.begin_turn(state).await,
            Stage::Transcribe => self.transcribe(state, publish).await,
            Stage::DetectEmotion => self.detect_emotion(state, publish).await,
            Stage::Generate => self.generate(state, publish).await,
        };
        if let Err(e) = &result {
            error!(session_id = %state.session_id, "{e}");
        }
        result
    }

    /// Run all four stages in order, stopping at the first failure.
    ///
    /// Always returns an idle state; a failure is reflected in its status.
    pub async fn run_turn(&self, state: &SessionState, publish: Publish<'_>) -> SessionState {
        let mut current = state.clone();
        for stage in Stage::ALL {
            match self.run(stage, &current, publish).await {
                Ok(next) => {
                    publish(&next);
                    current = next;
                }
                Err(e) => {
                    let failed = current.fail(&e);
                    publish(&failed);
                    return failed;
                }
            }
        }
        current
    }
}
