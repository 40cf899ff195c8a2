//! Geometry value types shared by every sensor kind
//!
//! Plain serde-friendly structs at the API boundary, with conversions into
//! nalgebra for callers that want to do math on them.

use nalgebra::{Matrix3, Quaternion as NaQuaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::derived;

/// Three-axis measurement (acceleration in g, rotation rate in rad/s, field in µT)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        derived::magnitude(*self)
    }

    /// NaN or infinite components mean the platform produced garbage
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<nalgebra::Vector3<f64>> for Vector3 {
    fn from(v: nalgebra::Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for nalgebra::Vector3<f64> {
    fn from(v: Vector3) -> Self {
        nalgebra::Vector3::new(v.x, v.y, v.z)
    }
}

/// Orientation quaternion as supplied by the platform (w is the scalar part)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Device orientation in radians
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Only present when the host reports one alongside the Euler angles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quaternion: Option<Quaternion>,
}

impl Attitude {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            quaternion: None,
        }
    }

    pub fn with_quaternion(mut self, quaternion: Quaternion) -> Self {
        self.quaternion = Some(quaternion);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.roll.is_finite()
            && self.pitch.is_finite()
            && self.yaw.is_finite()
            && self.quaternion.map_or(true, |q| q.is_finite())
    }

    /// Platform quaternion when available, otherwise built from roll/pitch/yaw
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        match self.quaternion {
            Some(q) => UnitQuaternion::from_quaternion(NaQuaternion::new(q.w, q.x, q.y, q.z)),
            None => UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw),
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation().to_rotation_matrix().into_inner()
    }
}
