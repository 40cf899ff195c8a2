//! Mock backend for testing
//!
//! Records every interval it is configured with and every start/stop, and
//! lets the test push samples or errors through the installed callback on
//! the calling thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{PlatformCallback, PlatformResult, SensorBackend};
use crate::error::{MotionError, MotionResult};
use crate::types::RawSample;

#[derive(Default)]
struct MockState {
    available: bool,
    intervals: Vec<Duration>,
    start_count: u32,
    stop_count: u32,
    callback: Option<PlatformCallback>,
}

/// Mock sensor backend
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Create an available mock
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                available: true,
                ..MockState::default()
            }),
        }
    }

    /// Mock for a sensor the device lacks
    pub fn unavailable() -> Self {
        let mock = Self::new();
        mock.set_available(false);
        mock
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.available = available;
        }
    }

    /// Deliver a sample; returns false when the stream is not running
    pub fn emit(&self, sample: RawSample) -> bool {
        self.deliver(Ok(sample))
    }

    /// Deliver a platform read failure
    pub fn emit_error(&self, message: &str) -> bool {
        self.deliver(Err(MotionError::SampleError(message.to_string())))
    }

    pub fn deliver(&self, result: PlatformResult) -> bool {
        // Clone out so the callback can re-enter stop() without deadlocking
        let callback = self.state.lock().ok().and_then(|s| s.callback.clone());
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    /// Every interval passed to `set_update_interval`, in order
    pub fn configured_intervals(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|s| s.intervals.clone())
            .unwrap_or_default()
    }

    pub fn last_interval(&self) -> Option<Duration> {
        self.configured_intervals().last().copied()
    }

    pub fn start_count(&self) -> u32 {
        self.state.lock().map(|s| s.start_count).unwrap_or(0)
    }

    pub fn stop_count(&self) -> u32 {
        self.state.lock().map(|s| s.stop_count).unwrap_or(0)
    }

    pub fn is_streaming(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.callback.is_some())
            .unwrap_or(false)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBackend for MockBackend {
    fn is_available(&self) -> bool {
        self.state.lock().map(|s| s.available).unwrap_or(false)
    }

    fn set_update_interval(&self, interval: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.intervals.push(interval);
        }
    }

    fn start(&self, callback: PlatformCallback) -> MotionResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| MotionError::Internal("Failed to acquire mock state lock".to_string()))?;
        state.start_count += 1;
        state.callback = Some(callback);
        Ok(())
    }

    fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.callback.take().is_some() {
                state.stop_count += 1;
            }
        }
    }
}
