//! Wires configured adapters into a ready [`AssistantService`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::audio::{ArtifactStore, MicRecorder};
use crate::config::AttuneConfig;
use crate::emotion::{FusedEmotionDetector, HfSpeechEmotionClassifier, HfTextEmotionClassifier};
use crate::error::Result;
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::llm::ChatApiGenerator;
use crate::pipeline::{PipelinePorts, TurnPipeline};
use crate::service::AssistantService;
use crate::stt::WhisperApiTranscriber;
use crate::tts::{ApiSpeaker, SilentSpeaker, Speaker};

/// Build the production service from configuration.
///
/// # Errors
///
/// Returns an error if the history database cannot be opened or an HTTP
/// client cannot be built.
pub fn build_service(config: &AttuneConfig) -> Result<AssistantService> {
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(&config.history.db_path)?);
    build_service_with_history(config, history)
}

/// Like [`build_service`] with a caller-supplied history store.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built.
pub fn build_service_with_history(
    config: &AttuneConfig,
    history: Arc<dyn HistoryStore>,
) -> Result<AssistantService> {
    let speaker: Arc<dyn Speaker> = if config.tts.enabled {
        Arc::new(ApiSpeaker::new(&config.tts, config.audio.output_device.clone())?)
    } else {
        info!("speech output disabled");
        Arc::new(SilentSpeaker)
    };

    let emotion = FusedEmotionDetector::new(
        Arc::new(HfTextEmotionClassifier::new(&config.emotion)?),
        Arc::new(HfSpeechEmotionClassifier::new(&config.emotion)?),
    );

    let ports = PipelinePorts {
        recorder: Arc::new(MicRecorder::new(&config.audio)),
        transcriber: Arc::new(WhisperApiTranscriber::new(&config.stt)?),
        emotion: Arc::new(emotion),
        generator: Arc::new(ChatApiGenerator::new(&config.llm)?),
        speaker,
        history,
    };

    let pipeline = TurnPipeline::new(ports, ArtifactStore::new(config.audio.artifact_dir.clone()))
        .with_record_duration(config.audio.record_duration())
        .with_system_prompt(config.llm.system_prompt.clone());

    Ok(AssistantService::new(pipeline)
        .with_stale_turn_after(Duration::from_secs(config.session.stale_turn_secs)))
}
