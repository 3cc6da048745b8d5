//! Configuration types for the voice assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttuneConfig {
    /// Audio capture/playback settings.
    pub audio: AudioConfig,
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Emotion classifier settings.
    pub emotion: EmotionConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Chat history persistence.
    pub history: HistoryConfig,
    /// HTTP trigger surface.
    pub server: ServerConfig,
    /// Session lifecycle.
    pub session: SessionConfig,
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fixed recording length per turn, in seconds.
    pub record_duration_secs: u32,
    /// Sample rate of the written artifact in Hz.
    pub sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
    /// Directory holding one WAV artifact per session.
    pub artifact_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            record_duration_secs: 5,
            sample_rate: 44_100,
            input_device: None,
            output_device: None,
            artifact_dir: crate::attune_dirs::artifacts_dir(),
        }
    }
}

impl AudioConfig {
    /// Recording length as a [`Duration`].
    pub fn record_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.record_duration_secs))
    }
}

/// Speech-to-text configuration (OpenAI-compatible transcription endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL; `/v1/audio/transcriptions` is appended.
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".to_owned(),
            model: "whisper-large-v3".to_owned(),
            api_key_env: "GROQ_API_KEY".to_owned(),
            timeout_secs: 60,
        }
    }
}

/// Emotion classifier configuration (Hugging Face inference endpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Base URL; `/models/{model}` is appended.
    pub base_url: String,
    /// Text classification model.
    pub text_model: String,
    /// Audio classification model.
    pub audio_model: String,
    /// Environment variable holding the API token.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_owned(),
            text_model: "j-hartmann/emotion-english-distilroberta-base".to_owned(),
            audio_model: "ehcalabres/wav2vec2-lg-xlsr-en-speech-emotion-recognition".to_owned(),
            api_key_env: "HF_TOKEN".to_owned(),
            timeout_secs: 60,
        }
    }
}

/// Language model configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// System framing. `{emotion}` is replaced with the detected label.
    pub system_prompt: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Default tone-conditioning prompt.
    pub const DEFAULT_SYSTEM_PROMPT: &'static str = "You are a helpful and emotionally intelligent AI assistant. \
         Respond with empathy and clarity. The user's current emotion is: {emotion}.";
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai".to_owned(),
            model: "llama3-70b-8192".to_owned(),
            temperature: 0.7,
            api_key_env: "GROQ_API_KEY".to_owned(),
            system_prompt: Self::DEFAULT_SYSTEM_PROMPT.to_owned(),
            timeout_secs: 60,
        }
    }
}

/// Text-to-speech configuration (OpenAI-compatible speech endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// When false, replies are not spoken.
    pub enabled: bool,
    /// Base URL; `/v1/audio/speech` is appended.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Voice identifier.
    pub voice: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".to_owned(),
            model: "tts-1".to_owned(),
            voice: "nova".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            timeout_secs: 60,
        }
    }
}

/// Chat history persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            db_path: crate::attune_dirs::history_db(),
        }
    }
}

/// HTTP trigger surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (0 = auto-assign). The `PORT` environment variable wins.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// Port to bind, honouring a `PORT` environment override.
    pub fn effective_port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.port)
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A turn stuck mid-pipeline for longer than this is treated as abandoned
    /// and may be restarted by a new record trigger.
    pub stale_turn_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_turn_secs: 300,
        }
    }
}

/// Read an API key from the named environment variable.
///
/// Missing or empty variables yield `None`; adapters then send no
/// credentials, which suits local OpenAI-compatible servers.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

impl AttuneConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AttuneError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AttuneError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::attune_dirs::config_file()
    }
}
