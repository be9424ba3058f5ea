//! Audio capture session
//!
//! Owns one audio input route and encodes what it delivers into a WAV file.
//! The encoding parameters are fixed: mono, 44.1 kHz, 16-bit PCM.

use super::traits::{AudioInput, Subscription};
use hound::{WavSpec, WavWriter};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

type SharedWavWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Audio session errors
#[derive(Error, Debug)]
pub enum AudioSessionError {
    #[error("No compatible audio input route: {0}")]
    NoInputRoute(String),

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Audio route configuration failed: {0}")]
    Configuration(String),

    #[error("Audio session is already recording")]
    AlreadyRecording,

    #[error("Audio encoder error: {0}")]
    Encoder(#[from] hound::Error),
}

/// Recording format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// The format every session records in
    pub const RECORDING: AudioFormat = AudioFormat {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
    };

    /// Container file extension
    pub const EXTENSION: &'static str = "wav";

    /// Constant encoded bitrate in bits per second
    pub fn bitrate_bps(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32
    }

    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::RECORDING
    }
}

struct ActiveRecording {
    stream: Subscription,
    writer: SharedWavWriter,
    path: PathBuf,
    frames: Arc<AtomicU64>,
}

/// One audio recording on one input route
pub struct AudioCaptureSession {
    input: Arc<dyn AudioInput>,
    format: AudioFormat,
    active: Option<ActiveRecording>,
}

impl AudioCaptureSession {
    pub fn new(input: Arc<dyn AudioInput>) -> Self {
        Self {
            input,
            format: AudioFormat::RECORDING,
            active: None,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Path of the file currently being recorded
    pub fn output_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Frames encoded so far in the current recording
    pub fn frames_written(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| a.frames.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Configure the input route and start encoding to `output_path`.
    ///
    /// On failure no file is left at `output_path`.
    pub fn start(&mut self, output_path: &Path) -> Result<(), AudioSessionError> {
        if self.active.is_some() {
            return Err(AudioSessionError::AlreadyRecording);
        }

        let writer = WavWriter::create(output_path, self.format.wav_spec())?;
        let writer: SharedWavWriter = Arc::new(Mutex::new(Some(writer)));
        let frames = Arc::new(AtomicU64::new(0));

        let sink = writer.clone();
        let counter = frames.clone();
        let mut write_failed = false;
        let on_frames = Box::new(move |data: &[i16]| {
            let mut guard = sink.lock();
            let Some(w) = guard.as_mut() else {
                return;
            };
            for &sample in data {
                if let Err(e) = w.write_sample(sample) {
                    if !write_failed {
                        tracing::error!("Failed to write audio sample: {}", e);
                        write_failed = true;
                    }
                    return;
                }
            }
            counter.fetch_add(data.len() as u64, Ordering::Relaxed);
        });

        let stream = match self.input.open(&self.format, on_frames) {
            Ok(stream) => stream,
            Err(e) => {
                writer.lock().take();
                if let Err(remove_err) = std::fs::remove_file(output_path) {
                    tracing::warn!(
                        "Failed to remove unused audio file {:?}: {}",
                        output_path,
                        remove_err
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Audio recording started on '{}': {:?} ({}Hz, {}ch, {} bit/s)",
            self.input.name(),
            output_path,
            self.format.sample_rate,
            self.format.channels,
            self.format.bitrate_bps()
        );

        self.active = Some(ActiveRecording {
            stream,
            writer,
            path: output_path.to_path_buf(),
            frames,
        });
        Ok(())
    }

    /// Stop encoding and finalize the file.
    ///
    /// Returns the finished file, or `None` when nothing was recording.
    /// The input route is released even if finalizing fails.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, AudioSessionError> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };

        active.stream.cancel();

        let writer = active.writer.lock().take();
        if let Some(writer) = writer {
            writer.finalize()?;
        }

        tracing::info!(
            "Audio recording finalized: {:?} ({} frames)",
            active.path,
            active.frames.load(Ordering::Relaxed)
        );
        Ok(Some(active.path))
    }
}

impl Drop for AudioCaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Failed to finalize audio on drop: {}", e);
        }
    }
}
