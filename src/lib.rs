//! Motion Recorder - device motion and microphone capture.
//!
//! This is the library crate behind the motion recorder app. A host UI builds a
//! [`RecordingController`] from a motion source and an optional audio input,
//! then drives it with start and stop. Each session produces a CSV motion log,
//! a WAV recording and, in the background, a gain-boosted copy of the audio.

pub mod capture;
pub mod export;
pub mod recorder;
pub mod utils;

pub use capture::{AudioInput, MotionSample, MotionSource, Subscription};
pub use export::AudioGainTransform;
pub use recorder::{CaptureConfig, RecordingController, RecordingEvent, SessionState};
pub use utils::error::{CaptureError, CaptureResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the logging subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to debug output for this
/// crate. Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_recorder_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_ok() {
        tracing::info!("Motion Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
