use crate::error::ConfigError;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of progress updates while playing.
    pub progress_interval_ms: u64,
    /// Period of the renderer driver that fires due triggers.
    pub trigger_interval_ms: u64,
    /// Initial volume, 0.0 -> 1.0
    pub volume: f32,
    /// Pause at the end of the score instead of idling past it.
    pub finish_at_end: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
            trigger_interval_ms: 5,
            volume: 1.0,
            finish_at_end: true,
        }
    }
}

impl SessionConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms.max(1))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let config: SessionConfig = ron::from_str(&ron_string)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }
}
