//! Recording controller
//!
//! Owns the session lifecycle: wires the motion source into a motion log,
//! drives the audio session next to it, and launches the gain boost once a
//! session is torn down.

use super::motion_log::MotionRowWriter;
use super::paths::{allocate_session, boosted_path};
use super::state::{
    CaptureConfig, RecordingEvent, RecordingSession, SessionOutput, SessionState, StartOutcome,
};
use crate::capture::{
    AudioCaptureSession, AudioInput, AudioSessionError, MotionSample, MotionSource,
    SampleCallback, SourceError, Subscription,
};
use crate::export::{AudioGainTransform, BoostTask};
use crate::utils::error::{CaptureError, CaptureResult};
use chrono::Local;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Resources held while a session is recording
struct ActiveSession {
    /// Identity and paths of the session
    session: RecordingSession,

    /// Cleared before the source is unsubscribed; late updates check it
    accepting: Arc<AtomicBool>,

    /// Shared with the sample callback
    writer: Arc<Mutex<MotionRowWriter>>,

    /// Sensor delivery, released on stop
    subscription: Subscription,
}

/// Orchestrates one motion source and one optional audio input
pub struct RecordingController {
    /// Validated configuration
    config: CaptureConfig,

    /// Motion sensor
    source: Arc<dyn MotionSource>,

    /// Microphone session, `None` when no input was given
    audio: Option<AudioCaptureSession>,

    /// Runs the post-session boost
    transform: AudioGainTransform,

    /// Current session state
    state: SessionState,

    /// Resources of the running session
    active: Option<ActiveSession>,

    /// Most recently launched boost, until taken
    boost: Option<BoostTask>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,

    /// Latest delivered sample
    preview_tx: Arc<watch::Sender<Option<MotionSample>>>,
}

impl RecordingController {
    /// Create a controller. `audio_input` may be `None` for motion-only capture.
    pub fn new(
        config: CaptureConfig,
        source: Arc<dyn MotionSource>,
        audio_input: Option<Arc<dyn AudioInput>>,
        transform: AudioGainTransform,
    ) -> CaptureResult<Self> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(100);
        let (preview_tx, _) = watch::channel(None);

        Ok(Self {
            config,
            source,
            audio: audio_input.map(AudioCaptureSession::new),
            transform,
            state: SessionState::Idle,
            active: None,
            boost: None,
            event_tx,
            preview_tx: Arc::new(preview_tx),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// The session currently recording
    pub fn session(&self) -> Option<&RecordingSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the latest delivered motion sample
    pub fn preview(&self) -> watch::Receiver<Option<MotionSample>> {
        self.preview_tx.subscribe()
    }

    /// Take the handle of the last boost launched by [`RecordingController::stop`].
    ///
    /// Boosts run to completion whether or not the handle is taken.
    pub fn take_boost(&mut self) -> Option<BoostTask> {
        self.boost.take()
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        let _ = self.event_tx.send(RecordingEvent::StateChanged(state));
    }

    /// Start a session.
    ///
    /// Ignored while a session is active. Fails without creating any file when
    /// the motion source is unavailable. An audio failure leaves the session
    /// running motion-only.
    pub fn start(&mut self) -> CaptureResult<StartOutcome> {
        let current_state = self.state();
        if current_state != SessionState::Idle {
            tracing::warn!("Start ignored: session is {:?}", current_state);
            return Ok(StartOutcome::AlreadyRecording);
        }

        if !self.source.is_available() {
            tracing::warn!("Motion source unavailable, not starting");
            return Err(CaptureError::UnsupportedDevice);
        }

        std::fs::create_dir_all(&self.config.output_dir)?;
        let started_at = Local::now();
        let paths = allocate_session(&self.config.output_dir, &started_at);
        tracing::info!("Starting session {} in {:?}", paths.id, self.config.output_dir);

        let writer = Arc::new(Mutex::new(MotionRowWriter::open(&paths.motion)?));
        let accepting = Arc::new(AtomicBool::new(true));

        let callback: SampleCallback = {
            let writer = writer.clone();
            let accepting = accepting.clone();
            let events = self.event_tx.clone();
            let preview = self.preview_tx.clone();
            Box::new(move |update: Result<MotionSample, SourceError>| {
                if !accepting.load(Ordering::Acquire) {
                    tracing::debug!("Dropping motion update delivered after stop");
                    return;
                }
                match update {
                    Ok(sample) => {
                        if let Err(e) = writer.lock().write(&sample) {
                            tracing::warn!("Failed to write motion sample: {}", e);
                            let _ = events.send(RecordingEvent::SampleSkipped(e.to_string()));
                        }
                        preview.send_replace(Some(sample));
                    }
                    Err(e) => {
                        tracing::warn!("Skipping motion update: {}", e);
                        let _ = events.send(RecordingEvent::SampleSkipped(e.to_string()));
                    }
                }
            })
        };

        let subscription = match self.source.start(callback) {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!("Motion source failed to start: {}", e);
                accepting.store(false, Ordering::Release);
                if let Err(close_err) = writer.lock().close() {
                    tracing::warn!("Failed to close motion log: {}", close_err);
                }
                if let Err(remove_err) = std::fs::remove_file(&paths.motion) {
                    tracing::warn!("Failed to remove motion log {:?}: {}", paths.motion, remove_err);
                }
                return Err(e.into());
            }
        };

        let mut session = RecordingSession::new(&paths, started_at);

        if self.config.capture_audio {
            if let Some(audio) = self.audio.as_mut() {
                match audio.start(&paths.audio) {
                    Ok(()) => session.audio_path = Some(paths.audio.clone()),
                    Err(e) => {
                        tracing::warn!("Audio unavailable, recording motion only: {}", e);
                        let _ = self
                            .event_tx
                            .send(RecordingEvent::AudioUnavailable(e.to_string()));
                    }
                }
            } else {
                tracing::info!("No audio input configured, recording motion only");
            }
        }

        let outcome = StartOutcome::Started {
            session_id: session.id.clone(),
            audio: session.audio_path.is_some(),
        };

        self.active = Some(ActiveSession {
            session,
            accepting,
            writer,
            subscription,
        });
        self.set_state(SessionState::Recording);

        tracing::info!("Session started");
        Ok(outcome)
    }

    /// Stop the active session.
    ///
    /// Returns `Ok(None)` when nothing is recording. Every resource is
    /// released even when a step fails. A failure to close the motion log is
    /// returned after teardown completes; an audio failure only drops the
    /// audio from the output and is reported in `audio_error`.
    pub fn stop(&mut self) -> CaptureResult<Option<SessionOutput>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };

        tracing::info!("Stopping session {}", active.session.id);
        self.set_state(SessionState::Stopping);

        active.accepting.store(false, Ordering::Release);
        active.subscription.cancel();

        let mut first_error: Option<CaptureError> = None;

        let motion_rows = {
            let mut writer = active.writer.lock();
            if let Err(e) = writer.close() {
                tracing::error!("Failed to close motion log: {}", e);
                first_error.get_or_insert(e.into());
            }
            writer.rows_written()
        };

        let (audio, audio_error) = match self.audio.as_mut() {
            Some(audio) => settle_audio(audio.stop(), &self.event_tx),
            None => (None, None),
        };

        let boosted_audio = match audio.as_deref() {
            Some(original) if self.config.boost_audio => self.launch_boost(original.to_path_buf()),
            _ => None,
        };

        let session = active.session;
        let output = SessionOutput {
            session_id: session.id,
            motion_log: session.motion_path,
            motion_rows,
            audio,
            audio_error,
            boosted_audio,
            duration_ms: (Local::now() - session.started_at).num_milliseconds(),
        };

        self.set_state(SessionState::Idle);
        tracing::info!(
            "Session {} stopped: {} motion rows, {}ms",
            output.session_id,
            output.motion_rows,
            output.duration_ms
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(Some(output)),
        }
    }

    fn launch_boost(&mut self, original: PathBuf) -> Option<PathBuf> {
        let Some(target) = boosted_path(&original) else {
            tracing::warn!("Cannot derive boosted path for {:?}", original);
            return None;
        };

        let events = self.event_tx.clone();
        let task = self.transform.boost_then(
            &original,
            &target,
            self.config.boost_gain,
            move |result| {
                let event = match result {
                    Ok(out) => RecordingEvent::BoostFinished(out.path.clone()),
                    Err(e) => RecordingEvent::BoostFailed(e.to_string()),
                };
                let _ = events.send(event);
            },
        );

        self.boost = Some(task);
        Some(target)
    }
}

/// Split the audio stop result into the finished file and a failure message.
///
/// A failed finalize is reported on `events` and never fails the session.
fn settle_audio(
    result: Result<Option<PathBuf>, AudioSessionError>,
    events: &broadcast::Sender<RecordingEvent>,
) -> (Option<PathBuf>, Option<String>) {
    match result {
        Ok(path) => (path, None),
        Err(e) => {
            tracing::error!("Failed to finalize audio, keeping motion log: {}", e);
            let message = e.to_string();
            let _ = events.send(RecordingEvent::AudioFinalizeFailed(message.clone()));
            (None, Some(message))
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Failed to stop session on teardown: {}", e);
            }
        }
    }
}
