// Pure derived values: vector norm and the clamped tilt used by the view-tilt effect.

use serde::{Deserialize, Serialize};

use crate::types::{Attitude, Vector3};

/// Pitch the device is assumed to be held at when "level" for the tilt effect
pub const TILT_PITCH_OFFSET: f64 = 0.5;

/// Euclidean norm, always >= 0
pub fn magnitude(v: Vector3) -> f64 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Rotation angles to apply to a view, about its y axis (`x_angle`) and x axis (`y_angle`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TiltRotation {
    pub x_angle: f64,
    pub y_angle: f64,
}

/// Map an attitude onto bounded view rotations.
///
/// `x = clamp(-roll, -1, 1) * max_angle`, `y = clamp(pitch - 0.5, -1, 1) * max_angle`.
/// Both outputs stay within `[-max_angle, max_angle]` for any input.
pub fn clamped_tilt_rotation(attitude: &Attitude, max_angle: f64) -> TiltRotation {
    TiltRotation {
        x_angle: clamp_unit(-attitude.roll) * max_angle,
        y_angle: clamp_unit(attitude.pitch - TILT_PITCH_OFFSET) * max_angle,
    }
}

fn clamp_unit(value: f64) -> f64 {
    // NaN would slip through f64::clamp
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_magnitude() {
        assert_eq!(magnitude(Vector3::new(3.0, 4.0, 0.0)), 5.0);
        assert_eq!(magnitude(Vector3::new(0.0, 0.0, -1.0)), 1.0);
        assert_eq!(magnitude(Vector3::ZERO), 0.0);

        let samples = [
            (1.0, 2.0, 2.0),
            (-0.6, 0.0, -0.8),
            (9.81, -0.02, 0.3),
            (-1e-3, 1e3, -7.5),
        ];
        for (x, y, z) in samples {
            let m = magnitude(Vector3::new(x, y, z));
            assert!(m >= 0.0);
            assert_relative_eq!(m, (x * x + y * y + z * z).sqrt());
        }
    }

    #[test]
    fn test_tilt_in_range() {
        let rotation = clamped_tilt_rotation(&Attitude::new(0.2, 0.7, 0.0), 0.3);
        assert_relative_eq!(rotation.x_angle, -0.2 * 0.3);
        assert_relative_eq!(rotation.y_angle, 0.2 * 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_tilt_clamps_out_of_range() {
        let max_angle = 0.5;

        let rotation = clamped_tilt_rotation(&Attitude::new(5.0, 0.0, 0.0), max_angle);
        assert_eq!(rotation.x_angle, -max_angle);
        assert_eq!(rotation.y_angle, -0.5 * max_angle);

        let rotation = clamped_tilt_rotation(&Attitude::new(-5.0, 3.0, 0.0), max_angle);
        assert_eq!(rotation.x_angle, max_angle);
        assert_eq!(rotation.y_angle, max_angle);

        let rotation = clamped_tilt_rotation(&Attitude::new(0.0, -4.0, 1.0), max_angle);
        assert_eq!(rotation.y_angle, -max_angle);
    }

    #[test]
    fn test_tilt_bounds_sweep() {
        let max_angle = 0.3;
        let mut roll = -6.0;
        while roll <= 6.0 {
            let mut pitch = -6.0;
            while pitch <= 6.0 {
                let r = clamped_tilt_rotation(&Attitude::new(roll, pitch, 0.0), max_angle);
                assert!(r.x_angle >= -max_angle && r.x_angle <= max_angle);
                assert!(r.y_angle >= -max_angle && r.y_angle <= max_angle);
                pitch += 0.25;
            }
            roll += 0.25;
        }
    }

    #[test]
    fn test_tilt_nan_is_neutral() {
        let r = clamped_tilt_rotation(&Attitude::new(f64::NAN, f64::NAN, 0.0), 0.3);
        assert_eq!(r, TiltRotation::default());
    }
}
