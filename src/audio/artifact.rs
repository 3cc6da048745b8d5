//! Per-session WAV artifacts on disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{AttuneError, Result};
use crate::session::SessionId;

/// Directory that holds one recording per session.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact handle for `session_id`. The file need not exist yet.
    pub fn artifact_for(&self, session_id: &SessionId) -> AudioArtifact {
        AudioArtifact {
            path: self.dir.join(format!("{session_id}.wav")),
        }
    }
}

/// The recording for a session's current turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    path: PathBuf,
}

impl AudioArtifact {
    /// Wrap an arbitrary path, e.g. a file prepared by a test.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Remove the file. Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists and cannot be removed.
    pub fn delete(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AttuneError::Io(e)),
        }
    }

    /// Raw WAV bytes, for upload to remote models.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }

    /// Write mono samples as a 16-bit PCM WAV, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns [`AttuneError::Capture`] if the file cannot be written.
    pub fn write_wav(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&self.path, spec)
            .map_err(|e| AttuneError::Capture(format!("failed to create wav writer: {e}")))?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer
                .write_sample(v)
                .map_err(|e| AttuneError::Capture(format!("failed to write wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| AttuneError::Capture(format!("failed to finalize wav: {e}")))
    }
}

/// Decode WAV bytes into mono f32 samples and their sample rate.
///
/// # Errors
///
/// Returns [`AttuneError::Speech`] if the bytes are not a readable WAV.
pub fn decode_wav_mono(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AttuneError::Speech(format!("cannot parse WAV: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map_err(|e| AttuneError::Speech(format!("WAV read error: {e}")))
                        .map(|v| v as f32 / max)
                })
                .collect::<Result<Vec<f32>>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| AttuneError::Speech(format!("WAV read error: {e}"))))
            .collect::<Result<Vec<f32>>>()?,
    };

    let mono = if spec.channels > 1 {
        super::to_mono(&samples, spec.channels)
    } else {
        samples
    };
    Ok((mono, spec.sample_rate))
}
