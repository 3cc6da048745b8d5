//! Shared fakes and a service harness for integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use attune::audio::{ArtifactStore, AudioArtifact, AudioRecorder};
use attune::emotion::{
    EmotionScore, FusedEmotionDetector, SpeechEmotionClassifier, TextEmotionClassifier,
};
use attune::error::{AttuneError, Result};
use attune::history::{HistoryStore, MemoryHistoryStore, Message, NewMessage};
use attune::llm::{ConversationContext, ResponseGenerator};
use attune::pipeline::{PipelinePorts, TurnPipeline};
use attune::service::AssistantService;
use attune::session::SessionId;
use attune::stt::Transcriber;
use attune::tts::Speaker;

/// Writes a short silent WAV instead of using a microphone.
pub(crate) struct SilentRecorder;

#[async_trait]
impl AudioRecorder for SilentRecorder {
    async fn record(&self, artifact: &AudioArtifact, _duration: Duration) -> Result<()> {
        artifact.write_wav(&[0.0; 1_600], 16_000)
    }
}

/// Returns scripted transcripts (or failures) in order.
pub(crate) struct ScriptedTranscriber {
    outputs: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedTranscriber {
    pub(crate) fn new(outputs: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Wait this long before answering each call.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, audio: &AudioArtifact) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(audio.exists(), "transcriber called without a recording");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.outputs.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(detail)) => Err(AttuneError::Transcription(detail)),
            None => Err(AttuneError::Transcription("no scripted transcript".into())),
        }
    }
}

/// Text classifier returning a fixed score, or failing when `None`.
pub(crate) struct FixedText(pub(crate) Option<EmotionScore>);

#[async_trait]
impl TextEmotionClassifier for FixedText {
    async fn classify(&self, _text: &str) -> Result<EmotionScore> {
        self.0
            .clone()
            .ok_or_else(|| AttuneError::EmotionDetection("text model offline".into()))
    }
}

/// Speech classifier returning a fixed score, or failing when `None`.
pub(crate) struct FixedSpeech(pub(crate) Option<EmotionScore>);

#[async_trait]
impl SpeechEmotionClassifier for FixedSpeech {
    async fn classify(&self, _audio: &AudioArtifact) -> Result<EmotionScore> {
        self.0
            .clone()
            .ok_or_else(|| AttuneError::EmotionDetection("audio model offline".into()))
    }
}

/// Returns scripted replies and remembers every context it was given.
pub(crate) struct ScriptedGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    contexts: Mutex<Vec<ConversationContext>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn contexts(&self) -> Vec<ConversationContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, context: &ConversationContext) -> Result<String> {
        self.contexts.lock().unwrap().push(context.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(detail)) => Err(AttuneError::Generation(detail)),
            None => Err(AttuneError::Generation("no scripted reply".into())),
        }
    }
}

/// Records what it was asked to say; optionally fails.
#[derive(Default)]
pub(crate) struct RecordingSpeaker {
    pub(crate) fail: bool,
    spoken: Mutex<Vec<(String, String)>>,
}

impl RecordingSpeaker {
    pub(crate) fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str, emotion: &str) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_owned(), emotion.to_owned()));
        if self.fail {
            return Err(AttuneError::Speech("no output device".into()));
        }
        Ok(())
    }
}

/// Store that returns each session's messages newest-first.
#[derive(Default)]
pub(crate) struct ReversingHistoryStore {
    inner: MemoryHistoryStore,
}

#[async_trait]
impl HistoryStore for ReversingHistoryStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        self.inner.append(message).await
    }

    async fn append_turn(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(Message, Message)> {
        self.inner.append_turn(user, assistant).await
    }

    async fn read(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        let mut messages = self.inner.read(session_id).await?;
        messages.reverse();
        Ok(messages)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        self.inner.list_sessions().await
    }
}

/// Knobs for [`Harness::new`].
pub(crate) struct HarnessConfig {
    pub(crate) transcripts: Vec<std::result::Result<String, String>>,
    pub(crate) replies: Vec<std::result::Result<String, String>>,
    pub(crate) text_emotion: Option<EmotionScore>,
    pub(crate) audio_emotion: Option<EmotionScore>,
    pub(crate) speaker_fails: bool,
    pub(crate) reverse_history: bool,
    /// Use this store instead of a fresh in-memory one.
    pub(crate) history: Option<Arc<dyn HistoryStore>>,
    pub(crate) stale_after: Duration,
    /// How long each transcription takes.
    pub(crate) transcribe_delay: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            transcripts: vec![Ok("I got the job!".into())],
            replies: vec![Ok("Congratulations! That's wonderful news.".into())],
            text_emotion: Some(EmotionScore::new("happy", 0.82)),
            audio_emotion: Some(EmotionScore::new("neutral", 0.40)),
            speaker_fails: false,
            reverse_history: false,
            history: None,
            stale_after: Duration::from_secs(300),
            transcribe_delay: Duration::ZERO,
        }
    }
}

/// An [`AssistantService`] wired to fakes, with handles to inspect them.
pub(crate) struct Harness {
    pub(crate) service: Arc<AssistantService>,
    pub(crate) transcriber: Arc<ScriptedTranscriber>,
    pub(crate) generator: Arc<ScriptedGenerator>,
    pub(crate) speaker: Arc<RecordingSpeaker>,
    pub(crate) history: Arc<dyn HistoryStore>,
    pub(crate) artifacts: ArtifactStore,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub(crate) fn new(config: HarnessConfig) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let artifacts = ArtifactStore::new(dir.path().join("artifacts"));

        let transcriber = Arc::new(
            ScriptedTranscriber::new(config.transcripts).with_delay(config.transcribe_delay),
        );
        let generator = Arc::new(ScriptedGenerator::new(config.replies));
        let speaker = Arc::new(RecordingSpeaker {
            fail: config.speaker_fails,
            ..Default::default()
        });
        let history: Arc<dyn HistoryStore> = match config.history {
            Some(store) => store,
            None if config.reverse_history => Arc::new(ReversingHistoryStore::default()),
            None => Arc::new(MemoryHistoryStore::new()),
        };
        let emotion = FusedEmotionDetector::new(
            Arc::new(FixedText(config.text_emotion)),
            Arc::new(FixedSpeech(config.audio_emotion)),
        );

        let ports = PipelinePorts {
            recorder: Arc::new(SilentRecorder),
            transcriber: transcriber.clone(),
            emotion: Arc::new(emotion),
            generator: generator.clone(),
            speaker: speaker.clone(),
            history: history.clone(),
        };
        let pipeline = TurnPipeline::new(ports, artifacts.clone())
            .with_record_duration(Duration::from_millis(10));
        let service =
            Arc::new(AssistantService::new(pipeline).with_stale_turn_after(config.stale_after));

        Self {
            service,
            transcriber,
            generator,
            speaker,
            history,
            artifacts,
            _dir: dir,
        }
    }

    pub(crate) fn artifact(&self, id: &SessionId) -> AudioArtifact {
        self.artifacts.artifact_for(id)
    }
}

pub(crate) fn sid(raw: &str) -> SessionId {
    SessionId::parse(raw).expect("valid session id")
}
