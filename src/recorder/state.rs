//! Recording state management
//!
//! Defines the session state machine, the per-session record and the
//! configuration a controller is built from.

use super::paths::SessionPaths;
use crate::export::DEFAULT_GAIN;
use crate::utils::error::{CaptureError, CaptureResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current state of the recording system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Tearing down the active session
    Stopping,
}

/// One start-to-stop cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Derived from the start time, see [`super::paths::allocate_session`]
    pub id: String,

    pub motion_path: PathBuf,

    /// Audio file, when the audio stream started
    pub audio_path: Option<PathBuf>,

    pub started_at: DateTime<Local>,
}

impl RecordingSession {
    pub fn new(paths: &SessionPaths, started_at: DateTime<Local>) -> Self {
        Self {
            id: paths.id.clone(),
            motion_path: paths.motion.clone(),
            audio_path: None,
            started_at,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./recordings")
}

fn default_true() -> bool {
    true
}

fn default_gain() -> f32 {
    DEFAULT_GAIN
}

/// Configuration for a recording controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Directory every session writes into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Record the microphone alongside motion
    #[serde(default = "default_true")]
    pub capture_audio: bool,

    /// Boost the finished audio after each session
    #[serde(default = "default_true")]
    pub boost_audio: bool,

    /// Linear gain of the boost
    #[serde(default = "default_gain")]
    pub boost_gain: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            capture_audio: true,
            boost_audio: true,
            boost_gain: DEFAULT_GAIN,
        }
    }
}

impl CaptureConfig {
    /// Defaults with a different output directory
    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> CaptureResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CaptureConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded capture config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if !self.boost_gain.is_finite() || self.boost_gain <= 0.0 {
            return Err(CaptureError::InvalidConfig(format!(
                "boostGain must be a positive number, got {}",
                self.boost_gain
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "outputDir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Files produced by a stopped session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutput {
    pub session_id: String,

    pub motion_log: PathBuf,

    /// Rows written to the motion log
    pub motion_rows: u64,

    pub audio: Option<PathBuf>,

    /// Why the audio file could not be finalized, if it failed
    pub audio_error: Option<String>,

    /// Where the boosted derivative will appear, if a boost was launched
    pub boosted_audio: Option<PathBuf>,

    pub duration_ms: i64,
}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum StartOutcome {
    /// A new session is recording
    Started {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// False when the audio stream failed or is disabled
        audio: bool,
    },
    /// A session was already active; nothing changed
    AlreadyRecording,
}

/// Events emitted by a recording controller
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// The session state changed
    StateChanged(SessionState),
    /// The audio stream could not start; the session is motion-only
    AudioUnavailable(String),
    /// The audio file could not be finalized; the motion log is unaffected
    AudioFinalizeFailed(String),
    /// A delivered sample was skipped
    SampleSkipped(String),
    /// The boosted derivative is ready
    BoostFinished(PathBuf),
    /// The boost failed; the original recording is unaffected
    BoostFailed(String),
}
