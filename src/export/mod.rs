//! Audio export
//!
//! Post-session processing of finished recordings. Currently a single
//! constant-gain boost that writes a derivative next to the original.

pub mod gain;
pub mod types;

pub use gain::{
    apply_gain, peak_amplitude, AudioGainTransform, BoostTask, CancelToken, DEFAULT_GAIN,
};
pub use types::{AudioStats, BoostOutput, TransformError};
