pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MotionError;

/// Sensor streams the hub knows how to manage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    /// Fused stream: user acceleration, gravity, rotation rate, field, attitude
    DeviceMotion,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
        SensorKind::DeviceMotion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::Magnetometer => "magnetometer",
            SensorKind::DeviceMotion => "device motion",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorKind {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerometer" | "accel" => Ok(SensorKind::Accelerometer),
            "gyroscope" | "gyro" => Ok(SensorKind::Gyroscope),
            "magnetometer" | "mag" => Ok(SensorKind::Magnetometer),
            "device-motion" | "device_motion" | "device motion" | "motion" => {
                Ok(SensorKind::DeviceMotion)
            }
            other => Err(MotionError::InvalidParameters(format!(
                "unknown sensor kind '{}'",
                other
            ))),
        }
    }
}

/// Magnetometer calibration level reported by the platform
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagneticAccuracy {
    #[default]
    Uncalibrated,
    Low,
    Medium,
    High,
}

/// One fused device-motion sample; every facet comes from the same callback
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceMotionSample {
    pub timestamp: f64,
    pub user_acceleration: Vector3,
    pub gravity: Vector3,
    pub rotation_rate: Vector3,
    pub magnetic_field: Vector3,
    pub magnetic_accuracy: MagneticAccuracy,
    pub attitude: Attitude,
}

/// Raw sample exactly as a backend hands it over
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RawSample {
    Accelerometer {
        timestamp: f64,
        acceleration: Vector3,
    },
    Gyroscope {
        timestamp: f64,
        rotation_rate: Vector3,
    },
    Magnetometer {
        timestamp: f64,
        field: Vector3,
        accuracy: MagneticAccuracy,
    },
    DeviceMotion(DeviceMotionSample),
}

impl RawSample {
    pub fn kind(&self) -> SensorKind {
        match self {
            RawSample::Accelerometer { .. } => SensorKind::Accelerometer,
            RawSample::Gyroscope { .. } => SensorKind::Gyroscope,
            RawSample::Magnetometer { .. } => SensorKind::Magnetometer,
            RawSample::DeviceMotion(_) => SensorKind::DeviceMotion,
        }
    }
}

/// Normalized reading delivered to subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorReading {
    Accelerometer {
        timestamp: f64,
        vector: Vector3,
        magnitude: f64,
    },
    Gyroscope {
        timestamp: f64,
        vector: Vector3,
        magnitude: f64,
    },
    Magnetometer {
        timestamp: f64,
        vector: Vector3,
        magnitude: f64,
        accuracy: MagneticAccuracy,
    },
    DeviceMotion {
        timestamp: f64,
        user_acceleration: Vector3,
        gravity: Vector3,
        rotation_rate: Vector3,
        magnetic_field: Vector3,
        magnetic_accuracy: MagneticAccuracy,
        attitude: Attitude,
    },
}

impl SensorReading {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Accelerometer { .. } => SensorKind::Accelerometer,
            SensorReading::Gyroscope { .. } => SensorKind::Gyroscope,
            SensorReading::Magnetometer { .. } => SensorKind::Magnetometer,
            SensorReading::DeviceMotion { .. } => SensorKind::DeviceMotion,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            SensorReading::Accelerometer { timestamp, .. }
            | SensorReading::Gyroscope { timestamp, .. }
            | SensorReading::Magnetometer { timestamp, .. }
            | SensorReading::DeviceMotion { timestamp, .. } => *timestamp,
        }
    }

    /// Measurement vector of a raw (non-fused) reading
    pub fn vector(&self) -> Option<Vector3> {
        match self {
            SensorReading::Accelerometer { vector, .. }
            | SensorReading::Gyroscope { vector, .. }
            | SensorReading::Magnetometer { vector, .. } => Some(*vector),
            SensorReading::DeviceMotion { .. } => None,
        }
    }

    pub fn magnitude(&self) -> Option<f64> {
        match self {
            SensorReading::Accelerometer { magnitude, .. }
            | SensorReading::Gyroscope { magnitude, .. }
            | SensorReading::Magnetometer { magnitude, .. } => Some(*magnitude),
            SensorReading::DeviceMotion { .. } => None,
        }
    }

    pub fn attitude(&self) -> Option<Attitude> {
        match self {
            SensorReading::DeviceMotion { attitude, .. } => Some(*attitude),
            _ => None,
        }
    }

    pub fn gravity(&self) -> Option<Vector3> {
        match self {
            SensorReading::DeviceMotion { gravity, .. } => Some(*gravity),
            _ => None,
        }
    }

    pub fn user_acceleration(&self) -> Option<Vector3> {
        match self {
            SensorReading::DeviceMotion {
                user_acceleration, ..
            } => Some(*user_acceleration),
            _ => None,
        }
    }

    pub fn rotation_rate(&self) -> Option<Vector3> {
        match self {
            SensorReading::DeviceMotion { rotation_rate, .. } => Some(*rotation_rate),
            _ => None,
        }
    }

    /// Field and its calibration level, from the magnetometer or the fused stream
    pub fn magnetic_field(&self) -> Option<(Vector3, MagneticAccuracy)> {
        match self {
            SensorReading::Magnetometer {
                vector, accuracy, ..
            } => Some((*vector, *accuracy)),
            SensorReading::DeviceMotion {
                magnetic_field,
                magnetic_accuracy,
                ..
            } => Some((*magnetic_field, *magnetic_accuracy)),
            _ => None,
        }
    }
}
