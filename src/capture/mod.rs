//! Capture sources
//!
//! Motion sample types, the collaborator traits for the sensor and audio
//! route, and the audio capture session that encodes microphone input.

pub mod audio;
pub mod sample;
pub mod traits;

#[cfg(feature = "device-audio")]
pub mod cpal_input;

pub use audio::{AudioCaptureSession, AudioFormat, AudioSessionError};
pub use sample::{Attitude, MotionSample, Quaternion, Vector3};
pub use traits::{
    AudioDeviceInfo, AudioInput, FrameCallback, MotionSource, SampleCallback, SourceError,
    Subscription,
};

#[cfg(feature = "device-audio")]
pub use cpal_input::{input_devices, CpalInput};
