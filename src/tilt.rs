//! View-tilt effect driven by the fused attitude stream

use std::sync::Arc;

use crate::config::TiltConfig;
use crate::derived::{clamped_tilt_rotation, TiltRotation};
use crate::error::MotionResult;
use crate::hub::MotionHub;
use crate::registry::SubscriptionId;

type TiltSink = Arc<dyn Fn(TiltRotation) + Send + Sync>;

/// Feeds a clamped [`TiltRotation`] to a sink for every attitude update.
///
/// The subscription lives as long as the tracker. `stop` or drop ends it
/// and hands the sink one neutral rotation so the view can settle back.
pub struct TiltTracker {
    hub: MotionHub,
    id: Option<SubscriptionId>,
    sink: TiltSink,
}

impl TiltTracker {
    pub fn start<F>(hub: &MotionHub, config: &TiltConfig, sink: F) -> MotionResult<Self>
    where
        F: Fn(TiltRotation) + Send + Sync + 'static,
    {
        config.validate()?;
        let max_angle = config.max_angle;
        let sink: TiltSink = Arc::new(sink);
        let feed = Arc::clone(&sink);
        let id = hub.subscribe_attitude(config.interval()?, move |attitude| {
            feed(clamped_tilt_rotation(&attitude, max_angle));
        })?;
        log::info!("tilt tracking started ({}, max angle {} rad)", id, max_angle);

        Ok(Self {
            hub: hub.clone(),
            id: Some(id),
            sink,
        })
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.id.take() {
            self.hub.unsubscribe(id);
            (self.sink)(TiltRotation::default());
            log::info!("tilt tracking stopped");
        }
    }
}

impl Drop for TiltTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotionError;
    use crate::platform::mock::MockBackend;
    use crate::types::{Attitude, DeviceMotionSample, MagneticAccuracy, RawSample, SensorKind, Vector3};
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn motion(roll: f64, pitch: f64) -> RawSample {
        RawSample::DeviceMotion(DeviceMotionSample {
            timestamp: 0.0,
            user_acceleration: Vector3::ZERO,
            gravity: Vector3::new(0.0, 0.0, -1.0),
            rotation_rate: Vector3::ZERO,
            magnetic_field: Vector3::ZERO,
            magnetic_accuracy: MagneticAccuracy::Uncalibrated,
            attitude: Attitude::new(roll, pitch, 0.0),
        })
    }

    fn setup() -> (MotionHub, Arc<MockBackend>) {
        let mock = MockBackend::shared();
        let hub = MotionHub::builder()
            .backend(SensorKind::DeviceMotion, mock.clone())
            .build()
            .unwrap();
        (hub, mock)
    }

    #[test]
    fn test_tracker_emits_clamped_rotation() {
        let (hub, mock) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();

        let tracker = TiltTracker::start(&hub, &TiltConfig::default(), move |rotation| {
            seen_cb.lock().unwrap().push(rotation);
        })
        .unwrap();
        assert!(tracker.is_active());
        assert_eq!(mock.last_interval(), Some(Duration::from_millis(10)));

        mock.emit(motion(5.0, 0.5));
        mock.emit(motion(-0.1, 0.6));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_relative_eq!(seen[0].x_angle, -0.3);
        assert_relative_eq!(seen[0].y_angle, 0.0);
        assert_relative_eq!(seen[1].x_angle, 0.03, epsilon = 1e-12);
        assert_relative_eq!(seen[1].y_angle, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_stop_and_drop_unsubscribe() {
        let (hub, mock) = setup();
        let mut tracker = TiltTracker::start(&hub, &TiltConfig::default(), |_| {}).unwrap();
        assert!(hub.is_running(SensorKind::DeviceMotion));

        tracker.stop();
        tracker.stop();
        assert!(!tracker.is_active());
        assert!(!hub.is_running(SensorKind::DeviceMotion));
        assert_eq!(mock.stop_count(), 1);

        let tracker = TiltTracker::start(&hub, &TiltConfig::default(), |_| {}).unwrap();
        assert_eq!(hub.subscriber_count(SensorKind::DeviceMotion), 1);
        drop(tracker);
        assert_eq!(hub.subscriber_count(SensorKind::DeviceMotion), 0);
        assert_eq!(mock.stop_count(), 2);
    }

    #[test]
    fn test_stop_returns_view_to_neutral() {
        let (hub, mock) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let mut tracker = TiltTracker::start(&hub, &TiltConfig::default(), move |rotation| {
            seen_cb.lock().unwrap().push(rotation);
        })
        .unwrap();

        mock.emit(motion(-5.0, 2.0));
        tracker.stop();
        tracker.stop();
        mock.emit(motion(-5.0, 2.0));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                TiltRotation {
                    x_angle: 0.3,
                    y_angle: 0.3
                },
                TiltRotation::default(),
            ]
        );

        let seen_cb = seen.clone();
        let tracker = TiltTracker::start(&hub, &TiltConfig::default(), move |rotation| {
            seen_cb.lock().unwrap().push(rotation);
        })
        .unwrap();
        drop(tracker);
        assert_eq!(seen.lock().unwrap().last(), Some(&TiltRotation::default()));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_rejects_bad_config() {
        let (hub, _) = setup();
        let config = TiltConfig {
            interval_secs: 0.0,
            max_angle: 0.3,
        };
        assert!(matches!(
            TiltTracker::start(&hub, &config, |_| {}),
            Err(MotionError::InvalidParameters(_))
        ));
        assert_eq!(hub.subscriber_count(SensorKind::DeviceMotion), 0);
    }

    #[test]
    fn test_unavailable_motion() {
        let hub = MotionHub::builder().build().unwrap();
        assert!(matches!(
            TiltTracker::start(&hub, &TiltConfig::default(), |_| {}),
            Err(MotionError::Unavailable(SensorKind::DeviceMotion))
        ));
    }
}
