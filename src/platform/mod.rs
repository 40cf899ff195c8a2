//! Host platform capability
//!
//! Everything that touches real sensor hardware lives behind [`SensorBackend`].
//! The hub injects one backend per [`SensorKind`]; tests inject
//! [`mock::MockBackend`], the demo binary uses [`simulated::SimulatedBackend`].

pub mod mock;
pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use crate::error::{MotionError, MotionResult};
use crate::types::RawSample;

/// What a backend reports for each platform callback
pub type PlatformResult = Result<RawSample, MotionError>;

/// Delivery callback handed to [`SensorBackend::start`]
pub type PlatformCallback = Arc<dyn Fn(PlatformResult) + Send + Sync>;

/// Four-operation contract every host sensor binding implements.
///
/// Backends deliver on whatever thread or queue they own, never on the thread
/// that called `start` or `set_update_interval`: the hub calls both with its
/// subscriber list locked, and the callback takes that lock. A delivery that
/// begins before `start` returns simply waits for it. `stop` must not block
/// waiting for an in-flight delivery to finish: the hub may call it from
/// inside that very delivery.
pub trait SensorBackend: Send + Sync {
    /// Whether the hardware exists; must not start it
    fn is_available(&self) -> bool;

    /// Takes effect for the running stream too
    fn set_update_interval(&self, interval: Duration);

    fn start(&self, callback: PlatformCallback) -> MotionResult<()>;

    /// Safe to call when not started
    fn stop(&self);
}
