//! Inertial sensor aggregation
//!
//! One [`MotionHub`] owns a stream per sensor kind, shares it between any
//! number of subscribers and keeps the hardware running only while someone
//! is listening.

pub mod config;
pub mod derived;
pub mod error;
pub mod hub;
pub mod platform;
pub mod registry;
pub mod source;
pub mod tilt;
pub mod types;

pub use config::{HubConfig, TiltConfig};
pub use derived::{clamped_tilt_rotation, magnitude, TiltRotation};
pub use error::{MotionError, MotionResult};
pub use hub::{MotionHub, MotionHubBuilder};
pub use platform::{PlatformCallback, PlatformResult, SensorBackend};
pub use registry::{SubscriptionId, SubscriptionRequest};
pub use source::SensorSource;
pub use tilt::TiltTracker;
pub use types::{
    Attitude, DeviceMotionSample, MagneticAccuracy, Quaternion, RawSample, SensorKind,
    SensorReading, Vector3,
};
