//! End-to-end capture sessions against in-memory motion and audio sources.

use motion_recorder_lib::capture::{
    Attitude, AudioFormat, AudioInput, AudioSessionError, FrameCallback, MotionSample,
    MotionSource, Quaternion, SampleCallback, SourceError, Subscription, Vector3,
};
use motion_recorder_lib::export::{peak_amplitude, AudioGainTransform};
use motion_recorder_lib::recorder::{
    list_artifacts, CaptureConfig, MotionLogReader, RecordingController, RecordingEvent,
    SessionState, StartOutcome,
};
use motion_recorder_lib::CaptureError;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Sensor driven by the test. It keeps its callback after unsubscribe so
/// late deliveries can be simulated.
#[derive(Default)]
struct ManualSource {
    unavailable: bool,
    callback: Mutex<Option<SampleCallback>>,
    releases: Arc<AtomicUsize>,
}

impl ManualSource {
    fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    fn deliver(&self, sample: MotionSample) {
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(Ok(sample));
        }
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl MotionSource for ManualSource {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn start(&self, callback: SampleCallback) -> Result<Subscription, SourceError> {
        *self.callback.lock() = Some(callback);
        let releases = self.releases.clone();
        Ok(Subscription::new(move || {
            releases.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Microphone that delivers a quarter second of a 441 Hz tone on open
struct ToneInput {
    peak: i16,
}

impl AudioInput for ToneInput {
    fn name(&self) -> String {
        "tone".to_string()
    }

    fn open(
        &self,
        format: &AudioFormat,
        mut on_frames: FrameCallback,
    ) -> Result<Subscription, AudioSessionError> {
        let frames: Vec<i16> = (0..format.sample_rate / 4)
            .map(|n| {
                let phase = 2.0 * std::f64::consts::PI * 441.0 * n as f64 / format.sample_rate as f64;
                (phase.sin() * self.peak as f64).round() as i16
            })
            .collect();
        on_frames(&frames[..]);
        Ok(Subscription::new(|| {}))
    }
}

/// Input whose route can never be configured
struct NoRouteInput;

impl AudioInput for NoRouteInput {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn open(
        &self,
        _format: &AudioFormat,
        _on_frames: FrameCallback,
    ) -> Result<Subscription, AudioSessionError> {
        Err(AudioSessionError::NoInputRoute("headset disconnected".to_string()))
    }
}

fn sample(i: u32) -> MotionSample {
    let t = i as f64;
    MotionSample {
        quaternion: Quaternion { x: 0.1 * t, y: -0.2, z: 0.3, w: 0.9 },
        attitude: Attitude { pitch: 0.01 * t, roll: -0.02, yaw: 1.25 },
        gravity: Vector3::new(0.0, -0.98 + 0.001 * t, 0.17),
        rotation_rate: Vector3::new(t, 0.5, -0.5),
        user_acceleration: Vector3::new(0.002, 0.003 * t, -0.004),
    }
}

fn controller(
    config: CaptureConfig,
    source: Arc<ManualSource>,
    audio: Option<Arc<dyn AudioInput>>,
) -> RecordingController {
    RecordingController::new(config, source, audio, AudioGainTransform::new(Handle::current()))
        .unwrap()
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<RecordingEvent>) -> Vec<RecordingEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn test_three_samples_produce_header_and_three_rows() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        Some(Arc::new(ToneInput { peak: 10_000 })),
    );

    let StartOutcome::Started { session_id, audio } = ctl.start().unwrap() else {
        panic!("session did not start");
    };
    assert!(audio);
    assert_eq!(ctl.state(), SessionState::Recording);

    let samples = [sample(1), sample(2), sample(3)];
    for s in samples {
        source.deliver(s);
    }
    assert_eq!(*ctl.preview().borrow(), Some(samples[2]));

    let output = ctl.stop().unwrap().unwrap();
    assert_eq!(ctl.state(), SessionState::Idle);
    assert_eq!(output.session_id, session_id);
    assert_eq!(output.motion_rows, 3);
    assert_eq!(source.releases(), 1);

    assert_eq!(
        output.motion_log,
        dir.path().join(format!("{}_motion.csv", session_id))
    );
    let text = fs::read_to_string(&output.motion_log).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.starts_with("quaternion_x,quaternion_y,quaternion_z,quaternion_w,"));
    assert_eq!(MotionLogReader::read_all(&output.motion_log).unwrap(), samples);

    let audio_path = dir.path().join(format!("{}_audio.wav", session_id));
    assert_eq!(output.audio.as_deref(), Some(audio_path.as_path()));
    assert!(output.audio_error.is_none());
    let stats = peak_amplitude(&audio_path).unwrap();
    assert_eq!(stats.frames, 11_025);
    assert_eq!(stats.sample_rate, 44_100);
    assert_eq!(stats.channels, 1);

    if let Some(boost) = ctl.take_boost() {
        boost.wait().await.unwrap();
    }
}

#[tokio::test]
async fn test_unavailable_sensor_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("recordings");
    let mut ctl = controller(
        CaptureConfig::with_output_dir(&out),
        Arc::new(ManualSource::unavailable()),
        Some(Arc::new(ToneInput { peak: 1_000 })),
    );

    let err = ctl.start().unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedDevice));
    assert_eq!(ctl.state(), SessionState::Idle);
    assert!(ctl.session().is_none());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_second_stop_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        Some(Arc::new(ToneInput { peak: 4_000 })),
    );
    let mut events = ctl.subscribe();

    ctl.start().unwrap();
    source.deliver(sample(1));
    let first = ctl.stop().unwrap().unwrap();
    let boost = ctl.take_boost().unwrap();
    let log_at_stop = fs::read(&first.motion_log).unwrap();

    assert!(ctl.stop().unwrap().is_none());
    assert!(ctl.take_boost().is_none());
    assert_eq!(ctl.state(), SessionState::Idle);
    assert_eq!(source.releases(), 1);

    boost.wait().await.unwrap();
    let finished = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, RecordingEvent::BoostFinished(_)))
        .count();
    assert_eq!(finished, 1);
    assert_eq!(fs::read(&first.motion_log).unwrap(), log_at_stop);
}

#[tokio::test]
async fn test_audio_failure_keeps_motion_capture_running() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        Some(Arc::new(NoRouteInput)),
    );
    let mut events = ctl.subscribe();

    let outcome = ctl.start().unwrap();
    assert!(matches!(outcome, StartOutcome::Started { audio: false, .. }));
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, RecordingEvent::AudioUnavailable(_))));

    source.deliver(sample(7));
    source.deliver(sample(8));
    let output = ctl.stop().unwrap().unwrap();

    assert!(output.motion_rows >= 1);
    assert!(output.audio.is_none());
    assert!(output.audio_error.is_none());
    assert!(output.boosted_audio.is_none());
    assert!(ctl.take_boost().is_none());
    assert_eq!(MotionLogReader::read_all(&output.motion_log).unwrap().len(), 2);

    let sessions = list_artifacts(dir.path()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].audio.is_none());
}

#[tokio::test]
async fn test_late_sample_after_stop_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        None,
    );

    ctl.start().unwrap();
    source.deliver(sample(1));
    source.deliver(sample(2));
    let output = ctl.stop().unwrap().unwrap();
    let at_close = fs::read(&output.motion_log).unwrap();

    source.deliver(sample(3));
    assert_eq!(fs::read(&output.motion_log).unwrap(), at_close);
    assert_eq!(MotionLogReader::read_all(&output.motion_log).unwrap().len(), 2);
}

#[tokio::test]
async fn test_boost_writes_louder_copy_and_keeps_original() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        Some(Arc::new(ToneInput { peak: 10_000 })),
    );
    let mut events = ctl.subscribe();

    ctl.start().unwrap();
    source.deliver(sample(1));
    let output = ctl.stop().unwrap().unwrap();

    let original = output.audio.clone().unwrap();
    let original_bytes = fs::read(&original).unwrap();
    let boosted = output.boosted_audio.clone().unwrap();
    assert_eq!(boosted.parent(), original.parent());
    assert_eq!(
        boosted.file_name().unwrap().to_string_lossy(),
        format!("boosted_{}", original.file_name().unwrap().to_string_lossy())
    );

    let result = ctl.take_boost().unwrap().wait().await.unwrap();
    assert_eq!(result.path, boosted);
    assert_eq!(result.gain, 1.5);

    let before = peak_amplitude(&original).unwrap();
    let after = peak_amplitude(&boosted).unwrap();
    assert!((after.peak - before.peak * 1.5).abs() < 2.0 / 32_768.0);
    assert_eq!(after.frames, before.frames);
    assert_eq!(after.duration_secs(), before.duration_secs());
    assert_eq!(fs::read(&original).unwrap(), original_bytes);

    assert!(drain(&mut events).contains(&RecordingEvent::BoostFinished(boosted.clone())));

    let sessions = list_artifacts(dir.path()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].boosted_audio.as_deref(), Some(boosted.as_path()));
}

#[tokio::test]
async fn test_back_to_back_sessions_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let mut ctl = controller(
        CaptureConfig::with_output_dir(dir.path()),
        source.clone(),
        Some(Arc::new(ToneInput { peak: 2_000 })),
    );

    ctl.start().unwrap();
    source.deliver(sample(1));
    let first = ctl.stop().unwrap().unwrap();
    let first_boost = ctl.take_boost().unwrap();

    ctl.start().unwrap();
    source.deliver(sample(2));
    let second = ctl.stop().unwrap().unwrap();
    let second_boost = ctl.take_boost().unwrap();

    assert_ne!(first.session_id, second.session_id);
    assert_ne!(first.motion_log, second.motion_log);
    assert_ne!(first.audio, second.audio);

    first_boost.wait().await.unwrap();
    second_boost.wait().await.unwrap();
    assert_eq!(list_artifacts(dir.path()).unwrap().len(), 2);
}

#[tokio::test]
async fn test_motion_only_and_boost_switches() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());

    let mut config = CaptureConfig::with_output_dir(dir.path().join("motion-only"));
    config.capture_audio = false;
    let mut ctl = controller(config, source.clone(), Some(Arc::new(ToneInput { peak: 2_000 })));
    assert!(matches!(
        ctl.start().unwrap(),
        StartOutcome::Started { audio: false, .. }
    ));
    source.deliver(sample(1));
    let output = ctl.stop().unwrap().unwrap();
    assert!(output.audio.is_none());
    assert_eq!(fs::read_dir(dir.path().join("motion-only")).unwrap().count(), 1);

    let mut config = CaptureConfig::with_output_dir(dir.path().join("no-boost"));
    config.boost_audio = false;
    let mut ctl = controller(config, source.clone(), Some(Arc::new(ToneInput { peak: 2_000 })));
    ctl.start().unwrap();
    let output = ctl.stop().unwrap().unwrap();
    assert!(output.audio.is_some());
    assert!(output.boosted_audio.is_none());
    assert!(ctl.take_boost().is_none());
}

#[tokio::test]
async fn test_dropping_controller_stops_session() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ManualSource::default());
    let motion_log = {
        let mut ctl = controller(
            CaptureConfig::with_output_dir(dir.path()),
            source.clone(),
            None,
        );
        ctl.start().unwrap();
        source.deliver(sample(1));
        ctl.session().unwrap().motion_path.clone()
    };

    assert_eq!(source.releases(), 1);
    source.deliver(sample(2));
    assert_eq!(MotionLogReader::read_all(&motion_log).unwrap().len(), 1);
}

#[test]
fn test_config_file_round_trip_into_controller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.json");
    fs::write(
        &path,
        format!(
            r#"{{"outputDir": {:?}, "boostGain": 2.0}}"#,
            dir.path().join("takes")
        ),
    )
    .unwrap();

    let config = CaptureConfig::load(Path::new(&path)).unwrap();
    assert_eq!(config.boost_gain, 2.0);
    assert!(config.capture_audio);
    assert_eq!(config.output_dir, dir.path().join("takes"));
}
