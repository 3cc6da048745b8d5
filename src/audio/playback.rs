//! Audio playback to system speakers via cpal.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::{AttuneError, Result};

/// Slack on top of the clip length before playback is abandoned.
const PLAYBACK_GRACE: Duration = Duration::from_secs(2);

/// Longest a clip of `sample_count` mono samples may take to drain.
fn playback_deadline(sample_count: usize, sample_rate: u32) -> Duration {
    let secs = sample_count as f64 / f64::from(sample_rate.max(1));
    Duration::from_secs_f64(secs) + PLAYBACK_GRACE
}

/// Blocking mono playback on an output device.
pub struct CpalPlayback {
    device: cpal::Device,
}

impl CpalPlayback {
    /// Open the named output device, or the system default.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available.
    pub fn open(output_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = output_device {
            host.output_devices()
                .map_err(|e| AttuneError::Speech(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| AttuneError::Speech(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| AttuneError::Speech("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        Ok(Self { device })
    }

    /// Play mono samples at `sample_rate`. Blocks until finished, or until
    /// the clip length plus a short grace period has passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the audio stream cannot be created or played, or
    /// if the device stops pulling samples before the clip drains.
    pub fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: samples.to_vec(),
            position: 0,
            finished: false,
        }));
        let buffer_clone = Arc::clone(&buffer);

        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut buf = match buffer_clone.lock() {
                        Ok(b) => b,
                        Err(_) => return,
                    };
                    for sample in data.iter_mut() {
                        if buf.position < buf.samples.len() {
                            *sample = buf.samples[buf.position];
                            buf.position += 1;
                        } else {
                            *sample = 0.0;
                            buf.finished = true;
                        }
                    }
                },
                move |err| {
                    error!("audio output stream error: {err}");
                },
                None,
            )
            .map_err(|e| AttuneError::Speech(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| AttuneError::Speech(format!("failed to start output stream: {e}")))?;

        let deadline = Instant::now() + playback_deadline(samples.len(), sample_rate);
        loop {
            std::thread::sleep(Duration::from_millis(10));
            let buf = buffer
                .lock()
                .map_err(|e| AttuneError::Speech(format!("playback buffer lock poisoned: {e}")))?;
            if buf.finished {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AttuneError::Speech(format!(
                    "playback timed out after {} of {} samples",
                    buf.position,
                    buf.samples.len()
                )));
            }
        }

        drop(stream);
        Ok(())
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AttuneError::Speech(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}
