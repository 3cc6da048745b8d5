//! Fixed-duration microphone capture using cpal.
//!
//! Captures at the device's native rate and channel count, then downmixes
//! and resamples to the configured artifact rate before writing the WAV.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::artifact::AudioArtifact;
use crate::config::AudioConfig;
use crate::error::{AttuneError, Result};

/// Something that can fill an artifact with a recording.
#[async_trait]
pub trait AudioRecorder: Send + Sync {
    /// Capture `duration` of audio into `artifact`, blocking until done.
    async fn record(&self, artifact: &AudioArtifact, duration: Duration) -> Result<()>;
}

/// Records from the system microphone.
#[derive(Debug, Clone)]
pub struct MicRecorder {
    input_device: Option<String>,
    sample_rate: u32,
}

impl MicRecorder {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
            sample_rate: config.sample_rate,
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AttuneError::Capture(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl AudioRecorder for MicRecorder {
    async fn record(&self, artifact: &AudioArtifact, duration: Duration) -> Result<()> {
        let input_device = self.input_device.clone();
        let target_rate = self.sample_rate;
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || {
            let samples = capture_blocking(input_device.as_deref(), target_rate, duration)?;
            artifact.write_wav(&samples, target_rate)?;
            info!(
                path = %artifact.path().display(),
                samples = samples.len(),
                "recording saved"
            );
            Ok(())
        })
        .await
        .map_err(|e| AttuneError::Capture(format!("capture task failed: {e}")))?
    }
}

fn open_input_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AttuneError::Capture(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| AttuneError::Capture(format!("input device '{name}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| AttuneError::Capture("no default input device".into())),
    }
}

/// Record mono samples at `target_rate` for `duration`.
fn capture_blocking(device: Option<&str>, target_rate: u32, duration: Duration) -> Result<Vec<f32>> {
    let device = open_input_device(device)?;
    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());

    let default_config = device
        .default_input_config()
        .map_err(|e| AttuneError::Capture(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        "recording {:.1}s from {device_name}: {}Hz, {} channels",
        duration.as_secs_f32(),
        native_rate,
        native_channels
    );

    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
    let sink = Arc::clone(&buffer);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    super::to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(&mono);
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| AttuneError::Capture(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AttuneError::Capture(format!("failed to start input stream: {e}")))?;
    std::thread::sleep(duration);
    drop(stream);

    let captured = buffer
        .lock()
        .map_err(|e| AttuneError::Capture(format!("capture buffer lock poisoned: {e}")))?
        .clone();
    if captured.is_empty() {
        return Err(AttuneError::Capture("no audio captured".into()));
    }
    Ok(super::resample(&captured, native_rate, target_rate))
}
