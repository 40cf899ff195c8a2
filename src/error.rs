use std::time::Duration;
use thiserror::Error;

use crate::types::SensorKind;

/// Motion hub error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("{0} is not available on this device")]
    Unavailable(SensorKind),

    #[error("Sample error: {0}")]
    SampleError(String),

    #[error("No sample received within {0:?}")]
    Timeout(Duration),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MotionError {
    /// Per-sample failures are the only errors a stream survives
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MotionError::SampleError(_))
    }
}

/// Result type for hub operations
pub type MotionResult<T> = Result<T, MotionError>;

/// Reject intervals the platform cannot honour
pub fn validate_interval(interval: Duration) -> MotionResult<()> {
    if interval.is_zero() {
        return Err(MotionError::InvalidParameters(
            "update interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Convert a seconds value from config or CLI into a `Duration`
pub fn interval_from_secs(secs: f64) -> MotionResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(MotionError::InvalidParameters(format!(
            "interval must be a positive number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| MotionError::InvalidParameters(format!("interval {}s: {}", secs, e)))
}
