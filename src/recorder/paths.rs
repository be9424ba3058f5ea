//! Session file naming
//!
//! Every session writes into the configured output directory:
//! - `<session-id>_motion.csv`: the motion log
//! - `<session-id>_audio.wav`: the microphone recording
//! - `boosted_<session-id>_audio.wav`: the gain-boosted derivative
//!
//! The session ID is the start time formatted `YYYYMMDD_HHMMSS`, with a
//! `-N` suffix when an earlier session in the same second already used it.

use crate::capture::AudioFormat;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MOTION_SUFFIX: &str = "_motion.csv";
pub const BOOSTED_PREFIX: &str = "boosted_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn audio_suffix() -> String {
    format!("_audio.{}", AudioFormat::EXTENSION)
}

/// Format a wall-clock time as a session timestamp
pub fn session_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Output paths of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub id: String,
    pub motion: PathBuf,
    pub audio: PathBuf,
}

impl SessionPaths {
    pub fn for_id(dir: &Path, id: &str) -> Self {
        Self {
            id: id.to_string(),
            motion: dir.join(format!("{}{}", id, MOTION_SUFFIX)),
            audio: dir.join(format!("{}{}", id, audio_suffix())),
        }
    }

    /// Where the boosted derivative of this session's audio goes
    pub fn boosted_audio(&self) -> Option<PathBuf> {
        boosted_path(&self.audio)
    }

    fn any_exists(&self) -> bool {
        self.motion.exists()
            || self.audio.exists()
            || self.boosted_audio().is_some_and(|p| p.exists())
    }
}

/// Pick fresh paths for a session started at `time`.
///
/// The first ID whose motion, audio and boosted files are all absent wins.
pub fn allocate_session<Tz: TimeZone>(dir: &Path, time: &DateTime<Tz>) -> SessionPaths
where
    Tz::Offset: std::fmt::Display,
{
    let base = session_timestamp(time);
    let mut paths = SessionPaths::for_id(dir, &base);
    let mut counter = 2u32;

    while paths.any_exists() {
        paths = SessionPaths::for_id(dir, &format!("{}-{}", base, counter));
        counter += 1;
    }

    if counter > 2 {
        tracing::debug!("Session ID {} taken, using {}", base, paths.id);
    }
    paths
}

/// Derived path for the boosted copy of `original`: same directory, name
/// prefixed with `boosted_`.
pub fn boosted_path(original: &Path) -> Option<PathBuf> {
    let name = original.file_name()?.to_string_lossy();
    Some(original.with_file_name(format!("{}{}", BOOSTED_PREFIX, name)))
}

/// Files present on disk for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArtifacts {
    pub session_id: String,
    pub motion_log: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub boosted_audio: Option<PathBuf>,
}

/// Sort key of a session ID: the timestamp, then the collision suffix.
///
/// An ID without a suffix is the first session of its second.
fn session_order(id: &str) -> (&str, u32) {
    match id.rsplit_once('-') {
        Some((base, n)) => match n.parse() {
            Ok(n) => (base, n),
            Err(_) => (id, 1),
        },
        None => (id, 1),
    }
}

enum ArtifactKind {
    MotionLog,
    Audio,
    BoostedAudio,
}

/// Group the session files in `dir` by session ID, newest first.
///
/// Files that do not follow the session naming scheme are ignored.
pub fn list_artifacts(dir: &Path) -> std::io::Result<Vec<SessionArtifacts>> {
    let audio_suffix = audio_suffix();
    let mut sessions: BTreeMap<String, SessionArtifacts> = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let (id, kind) = if let Some(id) = name.strip_suffix(MOTION_SUFFIX) {
            (id, ArtifactKind::MotionLog)
        } else if let Some(id) = name
            .strip_prefix(BOOSTED_PREFIX)
            .and_then(|rest| rest.strip_suffix(audio_suffix.as_str()))
        {
            (id, ArtifactKind::BoostedAudio)
        } else if let Some(id) = name.strip_suffix(audio_suffix.as_str()) {
            (id, ArtifactKind::Audio)
        } else {
            continue;
        };

        if id.is_empty() {
            continue;
        }

        let artifacts = sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionArtifacts {
                session_id: id.to_string(),
                ..Default::default()
            });
        match kind {
            ArtifactKind::MotionLog => artifacts.motion_log = Some(path),
            ArtifactKind::Audio => artifacts.audio = Some(path),
            ArtifactKind::BoostedAudio => artifacts.boosted_audio = Some(path),
        }
    }

    let mut sessions: Vec<SessionArtifacts> = sessions.into_values().collect();
    sessions.sort_by(|a, b| session_order(&b.session_id).cmp(&session_order(&a.session_id)));
    Ok(sessions)
}
