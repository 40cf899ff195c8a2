//! Simulated backend
//!
//! Generates smooth synthetic motion on a worker thread so the hub can be
//! exercised without hardware. Each `start` spawns one worker; `stop` only
//! signals it, so stopping from inside a delivery never blocks.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::f64::consts::PI;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::{PlatformCallback, PlatformResult, SensorBackend};
use crate::error::{MotionError, MotionResult};
use crate::types::{
    Attitude, DeviceMotionSample, MagneticAccuracy, RawSample, SensorKind, Vector3,
};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

enum Control {
    Interval(Duration),
    Stop,
}

struct SimState {
    interval: Duration,
    worker: Option<Sender<Control>>,
}

pub struct SimulatedBackend {
    kind: SensorKind,
    available: bool,
    error_every: Option<u64>,
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            available: true,
            error_every: None,
            state: Mutex::new(SimState {
                interval: DEFAULT_INTERVAL,
                worker: None,
            }),
        }
    }

    /// Simulate a device without this sensor
    pub fn unavailable(kind: SensorKind) -> Self {
        let mut backend = Self::new(kind);
        backend.available = false;
        backend
    }

    /// Report a read failure instead of every n-th sample
    pub fn with_error_every(mut self, n: u64) -> Self {
        self.error_every = if n == 0 { None } else { Some(n) };
        self
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}

impl SensorBackend for SimulatedBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    fn set_update_interval(&self, interval: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.interval = interval;
            if let Some(worker) = &state.worker {
                let _ = worker.send(Control::Interval(interval));
            }
        }
    }

    fn start(&self, callback: PlatformCallback) -> MotionResult<()> {
        if !self.available {
            return Err(MotionError::Unavailable(self.kind));
        }

        let mut state = self.state.lock().map_err(|_| {
            MotionError::Internal("Failed to acquire simulator state lock".to_string())
        })?;
        if let Some(previous) = state.worker.take() {
            let _ = previous.send(Control::Stop);
        }

        let (tx, rx) = channel::unbounded();
        let kind = self.kind;
        let error_every = self.error_every;
        let initial = state.interval;

        thread::Builder::new()
            .name(format!("sim-{}", kind.name().replace(' ', "-")))
            .spawn(move || {
                let started = Instant::now();
                let mut interval = initial;
                let mut seq = 0u64;

                loop {
                    match rx.recv_timeout(interval) {
                        Ok(Control::Interval(next)) => {
                            interval = next;
                            continue;
                        }
                        Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    seq += 1;
                    let result: PlatformResult = match error_every {
                        Some(n) if seq % n == 0 => Err(MotionError::SampleError(format!(
                            "simulated {} dropout at sample {}",
                            kind, seq
                        ))),
                        _ => Ok(synthesize(kind, started.elapsed().as_secs_f64())),
                    };
                    callback(result);
                }

                log::debug!("simulated {} worker exited after {} samples", kind, seq);
            })
            .map_err(|e| MotionError::Internal(format!("Failed to spawn simulator: {}", e)))?;

        state.worker = Some(tx);
        Ok(())
    }

    fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(worker) = state.worker.take() {
                let _ = worker.send(Control::Stop);
            }
        }
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Synthetic sample for `kind` at `t` seconds since start (accel in g, field in µT)
pub fn synthesize(kind: SensorKind, t: f64) -> RawSample {
    let timestamp = current_timestamp();
    match kind {
        SensorKind::Accelerometer => RawSample::Accelerometer {
            timestamp,
            acceleration: Vector3::new(
                (t * 2.0 * PI).sin() * 0.05,
                (t * 2.0 * PI).cos() * 0.03,
                -1.0 + (t * PI).sin() * 0.01,
            ),
        },
        SensorKind::Gyroscope => RawSample::Gyroscope {
            timestamp,
            rotation_rate: Vector3::new(
                (t * 0.5).sin() * 0.05,
                (t * 0.3).cos() * 0.03,
                (t * 1.0).sin() * 0.1,
            ),
        },
        SensorKind::Magnetometer => RawSample::Magnetometer {
            timestamp,
            field: Vector3::new(22.0 + (t * 0.2).sin(), -4.0, -41.0 + (t * 0.1).cos()),
            accuracy: MagneticAccuracy::Uncalibrated,
        },
        SensorKind::DeviceMotion => {
            let attitude = Attitude::new(
                (t * 0.5).sin() * 0.3,
                0.6 + (t * 0.3).sin() * 0.2,
                (t * 0.1) % (2.0 * PI),
            );
            let down = nalgebra::Vector3::new(0.0, 0.0, -1.0);
            let gravity = attitude.rotation().inverse_transform_vector(&down);

            RawSample::DeviceMotion(DeviceMotionSample {
                timestamp,
                user_acceleration: Vector3::new(
                    (t * 2.0 * PI).sin() * 0.02,
                    (t * 2.0 * PI).cos() * 0.01,
                    0.0,
                ),
                gravity: gravity.into(),
                rotation_rate: Vector3::new(
                    (t * 0.5).cos() * 0.15,
                    (t * 0.3).cos() * 0.06,
                    0.1,
                ),
                magnetic_field: Vector3::new(21.5, -3.8, -40.2),
                magnetic_accuracy: MagneticAccuracy::High,
                attitude,
            })
        }
    }
}

fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
