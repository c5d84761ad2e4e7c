//! Backend configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! queue_capacity = 1024
//! poll_granularity_ms = 4
//! input_dir = "/dev/input"
//! rumble = true
//! ```

use crate::error::Result;
use crate::queue::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Events held before the oldest is dropped. Values below 1 act as 1.
    pub queue_capacity: usize,
    /// Sleep between decode passes while a blocking poll waits.
    pub poll_granularity_ms: u32,
    /// Directory scanned for kernel `event*` nodes (Linux).
    pub input_dir: PathBuf,
    /// When false, every rumble request fails.
    pub rumble: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            poll_granularity_ms: 4,
            input_dir: PathBuf::from("/dev/input"),
            rumble: true,
        }
    }
}

impl BackendConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Queue capacity with the lower bound applied.
    pub fn effective_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Wait slice with the lower bound applied.
    pub fn granularity_ms(&self) -> i32 {
        self.poll_granularity_ms.clamp(1, i32::MAX as u32) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let cfg = BackendConfig::default();
        assert_eq!(cfg.queue_capacity, 1024);
        assert_eq!(cfg.poll_granularity_ms, 4);
        assert_eq!(cfg.input_dir, PathBuf::from("/dev/input"));
        assert!(cfg.rumble);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = BackendConfig::from_toml("queue_capacity = 0\nrumble = false\n").unwrap();
        assert_eq!(cfg.effective_capacity(), 1);
        assert!(!cfg.rumble);
        assert_eq!(cfg.poll_granularity_ms, 4);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = BackendConfig::from_toml("queue_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
    }

    #[test]
    fn load_from_file_and_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("padbridge.toml");
        assert_eq!(BackendConfig::load(&path).unwrap(), BackendConfig::default());

        fs::write(&path, "input_dir = \"/tmp/fake-input\"\npoll_granularity_ms = 0\n").unwrap();
        let cfg = BackendConfig::load(&path).unwrap();
        assert_eq!(cfg.input_dir, PathBuf::from("/tmp/fake-input"));
        assert_eq!(cfg.granularity_ms(), 1);
    }

    #[test]
    fn json_round_trip() {
        let cfg = BackendConfig {
            queue_capacity: 16,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(serde_json::from_str::<BackendConfig>(&json).unwrap(), cfg);
    }
}
