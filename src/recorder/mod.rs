//! Recording system module
//!
//! This module implements the capture session lifecycle:
//! - RecordingController to orchestrate the motion source and audio session
//! - MotionRowWriter streaming motion samples into a CSV log
//! - Session naming and artifact discovery

pub mod controller;
pub mod motion_log;
pub mod paths;
pub mod state;

pub use controller::RecordingController;
pub use motion_log::{MotionLogError, MotionLogReader, MotionRowWriter};
pub use paths::{list_artifacts, SessionArtifacts, SessionPaths};
pub use state::{
    CaptureConfig, RecordingEvent, RecordingSession, SessionOutput, SessionState, StartOutcome,
};
