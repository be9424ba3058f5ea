//! Motion sample types
//!
//! Value types delivered by a [`MotionSource`](super::traits::MotionSource).
//! Samples are immutable once produced and carry no identity beyond arrival order.

use serde::{Deserialize, Serialize};

/// Orientation as a unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Attitude angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Three-axis vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One device-motion reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionSample {
    /// Orientation quaternion (unit norm, not re-validated)
    pub quaternion: Quaternion,

    /// Pitch, roll and yaw in radians
    pub attitude: Attitude,

    /// Gravity vector in g
    pub gravity: Vector3,

    /// Rotation rate in rad/s
    pub rotation_rate: Vector3,

    /// User acceleration in g
    pub user_acceleration: Vector3,
}

impl MotionSample {
    /// Render the multi-line block shown on screen while recording.
    pub fn preview_text(&self) -> String {
        let q = &self.quaternion;
        let a = &self.attitude;
        let g = &self.gravity;
        let r = &self.rotation_rate;
        let u = &self.user_acceleration;
        format!(
            "Quaternion:\n    x: {}\n    y: {}\n    z: {}\n    w: {}\n\
             Attitude:\n    pitch: {}\n    roll: {}\n    yaw: {}\n\
             Gravity:\n    x: {}\n    y: {}\n    z: {}\n\
             Rotation Rate:\n    x: {}\n    y: {}\n    z: {}\n\
             Acceleration:\n    x: {}\n    y: {}\n    z: {}",
            q.x, q.y, q.z, q.w, a.pitch, a.roll, a.yaw, g.x, g.y, g.z, r.x, r.y, r.z, u.x, u.y, u.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_text_lists_every_group() {
        let sample = MotionSample {
            quaternion: Quaternion { x: 0.5, y: -0.5, z: 0.25, w: 0.625 },
            gravity: Vector3::new(0.0, -1.0, 0.0),
            ..Default::default()
        };

        let text = sample.preview_text();
        for heading in ["Quaternion:", "Attitude:", "Gravity:", "Rotation Rate:", "Acceleration:"] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("w: 0.625"));
        assert!(text.contains("y: -1"));
    }

    #[test]
    fn test_vector_magnitude() {
        assert_eq!(Vector3::new(3.0, 4.0, 0.0).magnitude(), 5.0);
    }
}
