//! Motion log files
//!
//! One CSV row per motion sample, in delivery order, after a fixed header.
//! Floats are written in plain decimal with shortest round-trip precision, so
//! reading a log back yields the exact values that were written. Non-finite
//! values are written as `NaN`, `inf` or `-inf` and keep the column count fixed.

use crate::capture::{Attitude, MotionSample, Quaternion, Vector3};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column layout of every motion log
pub const HEADER: [&str; 16] = [
    "quaternion_x",
    "quaternion_y",
    "quaternion_z",
    "quaternion_w",
    "pitch",
    "roll",
    "yaw",
    "gravity_x",
    "gravity_y",
    "gravity_z",
    "rotation_rate_x",
    "rotation_rate_y",
    "rotation_rate_z",
    "user_acceleration_x",
    "user_acceleration_y",
    "user_acceleration_z",
];

/// Rows buffered between explicit flushes
const FLUSH_EVERY_ROWS: u64 = 64;

/// Motion log errors
#[derive(Error, Debug)]
pub enum MotionLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected motion log header: {0}")]
    Header(String),

    #[error("Invalid motion log row at line {line}: {message}")]
    Format { line: u64, message: String },
}

fn fields(sample: &MotionSample) -> [f64; 16] {
    let q = &sample.quaternion;
    let a = &sample.attitude;
    let g = &sample.gravity;
    let r = &sample.rotation_rate;
    let u = &sample.user_acceleration;
    [
        q.x, q.y, q.z, q.w, a.pitch, a.roll, a.yaw, g.x, g.y, g.z, r.x, r.y, r.z, u.x, u.y, u.z,
    ]
}

fn from_fields(v: [f64; 16]) -> MotionSample {
    MotionSample {
        quaternion: Quaternion { x: v[0], y: v[1], z: v[2], w: v[3] },
        attitude: Attitude { pitch: v[4], roll: v[5], yaw: v[6] },
        gravity: Vector3::new(v[7], v[8], v[9]),
        rotation_rate: Vector3::new(v[10], v[11], v[12]),
        user_acceleration: Vector3::new(v[13], v[14], v[15]),
    }
}

/// Streaming writer for one motion log.
///
/// Once closed, further writes are dropped without touching the file.
pub struct MotionRowWriter {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl MotionRowWriter {
    /// Create or truncate the log at `path` and write the header row
    pub fn open(path: &Path) -> Result<Self, MotionLogError> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;

        tracing::info!("Motion log opened: {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Append one row for `sample`.
    ///
    /// Returns `Ok(false)` without writing when the log is already closed.
    pub fn write(&mut self, sample: &MotionSample) -> Result<bool, MotionLogError> {
        let Some(writer) = self.writer.as_mut() else {
            tracing::debug!("Dropping motion sample: log {:?} is closed", self.path);
            return Ok(false);
        };

        let record = fields(sample).map(|v| v.to_string());
        writer.write_record(&record)?;
        self.rows += 1;

        if self.rows % FLUSH_EVERY_ROWS == 0 {
            writer.flush()?;
        }
        Ok(true)
    }

    /// Flush buffered rows to stable storage and release the file.
    ///
    /// Calling this on a closed log does nothing. The file handle is released
    /// even when flushing fails.
    pub fn close(&mut self) -> Result<(), MotionLogError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        tracing::info!("Motion log closed: {:?} ({} rows)", self.path, self.rows);
        Ok(())
    }
}

impl Drop for MotionRowWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close motion log {:?}: {}", self.path, e);
        }
    }
}

/// Reader for logs written by [`MotionRowWriter`]
pub struct MotionLogReader;

impl MotionLogReader {
    /// Read every sample of the log at `path`, in file order
    pub fn read_all(path: &Path) -> Result<Vec<MotionSample>, MotionLogError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let headers = reader.headers()?;
        if headers.iter().ne(HEADER.iter().copied()) {
            return Err(MotionLogError::Header(
                headers.iter().collect::<Vec<_>>().join(","),
            ));
        }

        let mut samples = Vec::new();
        for (index, result) in reader.records().enumerate() {
            // +1 for the header, +1 for 1-based lines
            let line = index as u64 + 2;
            let record = result?;

            if record.len() != HEADER.len() {
                return Err(MotionLogError::Format {
                    line,
                    message: format!("expected {} columns, found {}", HEADER.len(), record.len()),
                });
            }

            let mut values = [0.0f64; 16];
            for (column, (value, field)) in values.iter_mut().zip(record.iter()).enumerate() {
                *value = field.parse().map_err(|e| MotionLogError::Format {
                    line,
                    message: format!("{}: {}", HEADER[column], e),
                })?;
            }
            samples.push(from_fields(values));
        }

        tracing::debug!("Read {} motion samples from {:?}", samples.len(), path);
        Ok(samples)
    }
}
