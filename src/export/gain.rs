//! Post-session gain boost
//!
//! Reads a finished recording, scales every sample by a constant gain and
//! writes the result next to it. The output is staged in a temporary file in
//! the destination directory and only appears under its final name once it is
//! complete. The input file is never modified.

use super::types::{AudioStats, BoostOutput, TransformError};
use hound::{SampleFormat, WavReader, WavWriter};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Gain applied after every session unless configured otherwise (+50%)
pub const DEFAULT_GAIN: f32 = 1.5;

/// Samples processed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Shared cancellation flag for a running transform
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handle to a transform running in the background.
///
/// Await it with [`BoostTask::wait`] or drop it to let it finish unobserved.
pub struct BoostTask {
    handle: JoinHandle<Result<BoostOutput, TransformError>>,
    cancel: CancelToken,
    output: PathBuf,
}

impl BoostTask {
    /// Where the boosted file will appear
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask the transform to stop; it then fails with [`TransformError::Cancelled`]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the transform to complete
    pub async fn wait(self) -> Result<BoostOutput, TransformError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(TransformError::Task(e.to_string())),
        }
    }
}

impl std::fmt::Debug for BoostTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostTask")
            .field("output", &self.output)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// Runs gain boosts on the blocking pool of a tokio runtime
#[derive(Debug, Clone)]
pub struct AudioGainTransform {
    runtime: Handle,
}

impl AudioGainTransform {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling context, if there is one
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Start boosting `input` by `gain` into `output`.
    ///
    /// Returns immediately; the work happens on the blocking pool.
    pub fn boost(&self, input: &Path, output: &Path, gain: f32) -> BoostTask {
        self.boost_then(input, output, gain, |_| {})
    }

    /// Like [`AudioGainTransform::boost`], calling `on_complete` with the
    /// result on the worker before the task resolves.
    pub fn boost_then<F>(&self, input: &Path, output: &Path, gain: f32, on_complete: F) -> BoostTask
    where
        F: FnOnce(&Result<BoostOutput, TransformError>) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let input = input.to_path_buf();
        let output_path = output.to_path_buf();
        let target = output_path.clone();

        tracing::info!("Boosting {:?} by {}x into {:?}", input, gain, output_path);

        let handle = self.runtime.spawn_blocking(move || {
            let result = apply_gain(&input, &target, gain, &token);
            match &result {
                Ok(out) => tracing::info!(
                    "Boosted audio saved at {:?} ({} samples, {} clipped)",
                    out.path,
                    out.samples,
                    out.clipped_samples
                ),
                Err(TransformError::Cancelled) => {
                    tracing::warn!("Boost of {:?} cancelled", input)
                }
                Err(e) => tracing::error!("Boost of {:?} failed: {}", input, e),
            }
            on_complete(&result);
            result
        });

        BoostTask {
            handle,
            cancel,
            output: output_path,
        }
    }
}

/// Scale every sample of `input` by `gain` and write the result to `output`.
///
/// Sample format, rate, channel layout and frame count are preserved. Integer
/// samples saturate at full scale. Fails with [`TransformError::OutputExists`]
/// rather than replacing an existing file.
pub fn apply_gain(
    input: &Path,
    output: &Path,
    gain: f32,
    cancel: &CancelToken,
) -> Result<BoostOutput, TransformError> {
    if !gain.is_finite() || gain <= 0.0 {
        return Err(TransformError::InvalidGain(gain));
    }
    if !input.is_file() {
        return Err(TransformError::InputNotFound(input.to_path_buf()));
    }
    if output.exists() {
        return Err(TransformError::OutputExists(output.to_path_buf()));
    }

    let mut reader =
        WavReader::open(input).map_err(|e| TransformError::InvalidInput(e.to_string()))?;
    let spec = reader.spec();

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".boost-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let mut samples = 0u64;
    let mut clipped = 0u64;
    {
        let mut writer = WavWriter::new(BufWriter::new(staged.as_file_mut()), spec)?;

        match spec.sample_format {
            SampleFormat::Int => {
                let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f64;
                let min = -max - 1.0;
                for (i, sample) in reader.samples::<i32>().enumerate() {
                    if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                        return Err(TransformError::Cancelled);
                    }
                    let scaled = (sample? as f64 * gain as f64).round();
                    let bounded = scaled.clamp(min, max);
                    if bounded != scaled {
                        clipped += 1;
                    }
                    writer.write_sample(bounded as i32)?;
                    samples += 1;
                }
            }
            SampleFormat::Float => {
                for (i, sample) in reader.samples::<f32>().enumerate() {
                    if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                        return Err(TransformError::Cancelled);
                    }
                    writer.write_sample(sample? * gain)?;
                    samples += 1;
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(TransformError::Cancelled);
        }
        writer.finalize()?;
    }
    staged.as_file().sync_all()?;

    staged.persist_noclobber(output).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            TransformError::OutputExists(output.to_path_buf())
        } else {
            TransformError::Io(e.error)
        }
    })?;

    Ok(BoostOutput {
        path: output.to_path_buf(),
        gain,
        samples,
        clipped_samples: clipped,
    })
}

/// Measure the peak level and length of a WAV file
pub fn peak_amplitude(path: &Path) -> Result<AudioStats, TransformError> {
    if !path.is_file() {
        return Err(TransformError::InputNotFound(path.to_path_buf()));
    }
    let mut reader =
        WavReader::open(path).map_err(|e| TransformError::InvalidInput(e.to_string()))?;
    let spec = reader.spec();

    let peak = match spec.sample_format {
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            let mut peak = 0i64;
            for sample in reader.samples::<i32>() {
                peak = peak.max((sample? as i64).abs());
            }
            peak as f64 / full_scale
        }
        SampleFormat::Float => {
            let mut peak = 0.0f64;
            for sample in reader.samples::<f32>() {
                peak = peak.max(sample?.abs() as f64);
            }
            peak
        }
    };

    Ok(AudioStats {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        frames: reader.duration(),
        peak,
    })
}
