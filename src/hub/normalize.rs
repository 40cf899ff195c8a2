use crate::error::{MotionError, MotionResult};
use crate::types::{RawSample, SensorKind, SensorReading, Vector3};

fn finite(kind: SensorKind, facet: &str, v: Vector3) -> MotionResult<Vector3> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MotionError::SampleError(format!(
            "{} reported non-finite {}: ({}, {}, {})",
            kind, facet, v.x, v.y, v.z
        )))
    }
}

/// Turn a backend sample into the reading subscribers see.
///
/// Samples of the wrong kind or with NaN/Inf components are rejected as
/// `SampleError` rather than forwarded.
pub fn normalize(kind: SensorKind, raw: RawSample) -> MotionResult<SensorReading> {
    if raw.kind() != kind {
        return Err(MotionError::SampleError(format!(
            "{} stream delivered a {} sample",
            kind,
            raw.kind()
        )));
    }

    let reading = match raw {
        RawSample::Accelerometer {
            timestamp,
            acceleration,
        } => {
            let vector = finite(kind, "acceleration", acceleration)?;
            SensorReading::Accelerometer {
                timestamp,
                vector,
                magnitude: vector.magnitude(),
            }
        }
        RawSample::Gyroscope {
            timestamp,
            rotation_rate,
        } => {
            let vector = finite(kind, "rotation rate", rotation_rate)?;
            SensorReading::Gyroscope {
                timestamp,
                vector,
                magnitude: vector.magnitude(),
            }
        }
        RawSample::Magnetometer {
            timestamp,
            field,
            accuracy,
        } => {
            let vector = finite(kind, "magnetic field", field)?;
            SensorReading::Magnetometer {
                timestamp,
                vector,
                magnitude: vector.magnitude(),
                accuracy,
            }
        }
        RawSample::DeviceMotion(sample) => {
            if !sample.attitude.is_finite() {
                return Err(MotionError::SampleError(format!(
                    "{} reported non-finite attitude",
                    kind
                )));
            }
            SensorReading::DeviceMotion {
                timestamp: sample.timestamp,
                user_acceleration: finite(kind, "user acceleration", sample.user_acceleration)?,
                gravity: finite(kind, "gravity", sample.gravity)?,
                rotation_rate: finite(kind, "rotation rate", sample.rotation_rate)?,
                magnetic_field: finite(kind, "magnetic field", sample.magnetic_field)?,
                magnetic_accuracy: sample.magnetic_accuracy,
                attitude: sample.attitude,
            }
        }
    };
    Ok(reading)
}
