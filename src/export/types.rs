//! Gain transform types
//!
//! Result and error types for the post-session audio boost.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A finished boost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostOutput {
    /// The boosted file
    pub path: PathBuf,
    /// Gain that was applied
    pub gain: f32,
    /// Samples written (all channels)
    pub samples: u64,
    /// Samples that saturated at full scale
    pub clipped_samples: u64,
}

/// Basic measurements of an audio file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStats {
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames per channel
    pub frames: u32,
    /// Largest absolute sample, relative to full scale
    pub peak: f64,
}

impl AudioStats {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Gain transform errors
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Input audio not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input has no readable audio track: {0}")]
    InvalidInput(String),

    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Invalid gain: {0}")]
    InvalidGain(f32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio codec error: {0}")]
    Codec(#[from] hound::Error),

    #[error("Transform cancelled")]
    Cancelled,

    #[error("Transform task failed: {0}")]
    Task(String),
}
