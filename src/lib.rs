//! Attune: an emotion-aware voice assistant.
//!
//! A turn is four separately triggered stages:
//! Record → Transcribe → Detect Emotion → Generate (+ speak)
//!
//! # Architecture
//!
//! - **Session**: per-conversation state, passed into and returned from each stage
//! - **Pipeline**: the stage functions, written against capability traits
//! - **Adapters**: microphone capture via `cpal`, Whisper transcription, Hugging
//!   Face emotion classifiers, an OpenAI-compatible chat model and speech API
//! - **History**: append-only message log in SQLite, paired into display turns
//! - **Service / server**: single-flight triggers per session over HTTP (`axum`)

pub mod api_client;
pub mod attune_dirs;
pub mod audio;
pub mod config;
pub mod emotion;
pub mod error;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod service;
pub mod session;
pub mod startup;
pub mod stt;
pub mod tts;

pub use config::AttuneConfig;
pub use error::{AttuneError, Result};
pub use pipeline::{Stage, StageError, TurnPipeline};
pub use service::AssistantService;
pub use session::{SessionId, SessionState, TurnPhase};
