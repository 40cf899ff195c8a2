use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{interval_from_secs, MotionError, MotionResult};

/// Settings for the view-tilt effect
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltConfig {
    /// Attitude sampling interval, seconds
    pub interval_secs: f64,
    /// Largest rotation applied to the view, radians
    pub max_angle: f64,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0.01,
            max_angle: 0.3,
        }
    }
}

impl TiltConfig {
    pub fn interval(&self) -> MotionResult<Duration> {
        interval_from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> MotionResult<()> {
        self.interval()?;
        if !self.max_angle.is_finite() || self.max_angle < 0.0 {
            return Err(MotionError::InvalidParameters(format!(
                "tilt max_angle must be a non-negative number of radians, got {}",
                self.max_angle
            )));
        }
        Ok(())
    }
}

/// Hub-wide defaults; every field may be omitted from a config file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Interval used when a subscription does not ask for one
    pub default_interval_secs: f64,
    /// Interval requested by one-shot "current value" queries
    pub current_value_interval_secs: f64,
    /// How long the `current_*` helpers wait for a sample
    pub current_value_timeout_secs: f64,
    pub tilt: TiltConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: 0.1,
            current_value_interval_secs: 0.5,
            current_value_timeout_secs: 1.0,
            tilt: TiltConfig::default(),
        }
    }
}

impl HubConfig {
    pub fn from_json_str(json: &str) -> MotionResult<Self> {
        let config: HubConfig = serde_json::from_str(json)
            .map_err(|e| MotionError::Config(format!("invalid hub config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MotionResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| MotionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> MotionResult<()> {
        self.default_interval()?;
        self.current_value_interval()?;
        self.current_value_timeout()?;
        self.tilt.validate()
    }

    pub fn default_interval(&self) -> MotionResult<Duration> {
        interval_from_secs(self.default_interval_secs)
    }

    pub fn current_value_interval(&self) -> MotionResult<Duration> {
        interval_from_secs(self.current_value_interval_secs)
    }

    pub fn current_value_timeout(&self) -> MotionResult<Duration> {
        interval_from_secs(self.current_value_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.default_interval().unwrap(), Duration::from_millis(100));
        assert_eq!(config.current_value_interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.current_value_timeout().unwrap(), Duration::from_secs(1));
        assert_eq!(config.tilt.interval().unwrap(), Duration::from_millis(10));
        assert_eq!(config.tilt.max_angle, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            HubConfig::from_json_str(r#"{ "default_interval_secs": 0.02, "tilt": { "max_angle": 0.5 } }"#)
                .unwrap();
        assert_eq!(config.default_interval().unwrap(), Duration::from_millis(20));
        assert_eq!(config.current_value_timeout_secs, 1.0);
        assert_eq!(config.tilt.max_angle, 0.5);
        assert_eq!(config.tilt.interval_secs, 0.01);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            HubConfig::from_json_str(r#"{ "default_interval_secs": 0 }"#),
            Err(MotionError::InvalidParameters(_))
        ));
        assert!(matches!(
            HubConfig::from_json_str(r#"{ "tilt": { "max_angle": -1.0 } }"#),
            Err(MotionError::InvalidParameters(_))
        ));
        assert!(matches!(
            HubConfig::from_json_str("not json"),
            Err(MotionError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = HubConfig::load("/nonexistent/motion_hub.json").unwrap_err();
        assert!(matches!(err, MotionError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("motion_hub_cfg_{}.json", std::process::id()));
        fs::write(&path, r#"{ "current_value_timeout_secs": 2.5 }"#).unwrap();
        let config = HubConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(config.current_value_timeout().unwrap(), Duration::from_millis(2500));
    }
}
