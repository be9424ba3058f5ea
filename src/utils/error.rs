//! Error types and handling
//!
//! Crate-level error taxonomy wrapping the per-subsystem errors, plus the
//! serializable form handed to the host UI.

use crate::capture::{AudioSessionError, SourceError};
use crate::export::TransformError;
use crate::recorder::MotionLogError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device motion is not supported on this device")]
    UnsupportedDevice,

    #[error("Motion source error: {0}")]
    MotionSource(SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Motion log error: {0}")]
    MotionLog(#[from] MotionLogError),

    #[error("Audio session error: {0}")]
    AudioSession(#[from] AudioSessionError),

    #[error("Audio transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<SourceError> for CaptureError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Unavailable => CaptureError::UnsupportedDevice,
            other => CaptureError::MotionSource(other),
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(error: serde_json::Error) -> Self {
        CaptureError::InvalidConfig(error.to_string())
    }
}

/// Error response for the host UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        let code = match &error {
            CaptureError::UnsupportedDevice => "UNSUPPORTED_DEVICE",
            CaptureError::MotionSource(_) => "MOTION_SOURCE_ERROR",
            CaptureError::Io(_) | CaptureError::MotionLog(_) => "IO_ERROR",
            CaptureError::AudioSession(_) => "AUDIO_SESSION_ERROR",
            CaptureError::Transform(_) => "TRANSFORM_ERROR",
            CaptureError::InvalidConfig(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
