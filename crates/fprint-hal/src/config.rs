//! HAL configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use fprint_core::LockoutPolicy;

use crate::error::HalError;

/// HAL configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    /// The single sensor this HAL serves
    pub sensor_id: i32,

    /// Failed-attempt lockout thresholds
    pub lockout: LockoutPolicy,

    /// Enrollment timeout handed to the provider (seconds)
    pub enroll_timeout_secs: u32,

    /// Template slots per user on the software sensor
    ///
    /// Hardware modules enforce their own limit and report `NoSpace`.
    pub max_enrollments_per_user: u32,

    /// Root of the per-user template stores
    pub data_root: PathBuf,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            sensor_id: 0,
            lockout: LockoutPolicy::default(),
            enroll_timeout_secs: 60,
            max_enrollments_per_user: 7,
            data_root: PathBuf::from("/data/vendor_de"),
        }
    }
}

impl HalConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fprint")
            .join("hal.json")
    }

    /// Template store for one user: `<data_root>/<user_id>/fpdata`
    pub fn template_dir(&self, user_id: i32) -> PathBuf {
        self.data_root.join(user_id.to_string()).join("fpdata")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.lockout.validate()?;
        if self.enroll_timeout_secs == 0 {
            return Err(invalid("enroll_timeout_secs must be positive"));
        }
        if self.max_enrollments_per_user == 0 {
            return Err(invalid("max_enrollments_per_user must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> HalError {
    HalError::Core(fprint_core::Error::Config(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HalConfig::default();
        assert_eq!(config.sensor_id, 0);
        assert_eq!(config.lockout.timed_threshold, 5);
        assert_eq!(config.lockout.permanent_threshold, 20);
        assert_eq!(config.enroll_timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_template_dir() {
        let config = HalConfig::default();
        assert_eq!(
            config.template_dir(10),
            PathBuf::from("/data/vendor_de/10/fpdata")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("hal.json");

        let mut config = HalConfig::default();
        config.lockout = LockoutPolicy::strict();
        config.data_root = dir.path().to_path_buf();
        config.save(&path).unwrap();

        assert_eq!(HalConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hal.json");
        std::fs::write(&path, r#"{ "lockout": { "timed_threshold": 2 } }"#).unwrap();

        let config = HalConfig::load(&path).unwrap();
        assert_eq!(config.lockout.timed_threshold, 2);
        assert_eq!(config.lockout.permanent_threshold, 20);
        assert_eq!(config.enroll_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hal.json");
        std::fs::write(&path, r#"{ "enroll_timeout_secs": 0 }"#).unwrap();

        assert!(HalConfig::load(&path).is_err());
    }
}
