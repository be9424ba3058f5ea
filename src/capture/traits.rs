//! Capture trait definitions
//!
//! Platform-agnostic seams for the two capture sources: the motion sensor and
//! the audio input route. Both hand back a [`Subscription`] whose drop releases
//! the underlying device deterministically.

use super::audio::{AudioFormat, AudioSessionError};
use super::sample::MotionSample;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error reported by a motion source, either at start or for a single sample
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Motion data is not available on this device")]
    Unavailable,

    #[error("Motion source failed to start: {0}")]
    StartFailed(String),

    #[error("Motion update error: {0}")]
    Update(String),
}

/// Callback receiving each motion update in delivery order
pub type SampleCallback = Box<dyn FnMut(Result<MotionSample, SourceError>) + Send + 'static>;

/// Callback receiving mono PCM frames from the audio input
pub type FrameCallback = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// A sensor that delivers timestamped motion samples once started.
///
/// Implementations deliver at most one sample at a time. Delivery stops when
/// the returned [`Subscription`] is cancelled or dropped.
pub trait MotionSource: Send + Sync {
    /// Whether device motion can be captured right now
    fn is_available(&self) -> bool;

    /// Begin delivering samples to `callback`
    fn start(&self, callback: SampleCallback) -> Result<Subscription, SourceError>;
}

/// A platform audio input route.
pub trait AudioInput: Send + Sync {
    /// Human readable name of the input, for logs
    fn name(&self) -> String;

    /// Configure the route for `format` and begin delivering frames.
    ///
    /// Frames are mono, signed 16-bit, at `format.sample_rate`.
    fn open(&self, format: &AudioFormat, on_frames: FrameCallback)
        -> Result<Subscription, AudioSessionError>;
}

/// Scoped handle to a running capture source.
///
/// The release action runs exactly once: on [`Subscription::cancel`] or on drop.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Stop delivery now
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Information about an audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Device name, also used as its ID
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}
