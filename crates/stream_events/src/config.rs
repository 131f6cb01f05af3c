use serde::Deserialize;

use crate::error::ConfigError;
use crate::frame::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_READ_BUFFER_BYTES};

/// When the external cancellation token is allowed to stop the read loop.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Checked only at the top of each iteration; a read in flight completes first.
    #[default]
    FrameBoundary,
    /// Also raced against a blocked read.
    Immediate,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Recorded on the reader's span as `stream`.
    pub label: String,
    pub max_frame_bytes: usize,
    pub read_buffer_bytes: usize,
    pub cancel_mode: CancelMode,
    /// Case-insensitive substrings that mark a read error as the peer going away.
    pub benign_markers: Vec<String>,
    /// Emit every trimmed frame at debug level.
    pub log_frames: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            label: "stream".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            cancel_mode: CancelMode::FrameBoundary,
            benign_markers: vec!["wsarecv".to_string()],
            log_frames: true,
        }
    }
}

impl ReaderConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_bytes must be greater than zero".to_string(),
            ));
        }
        if self.read_buffer_bytes == 0 {
            return Err(ConfigError::Invalid(
                "read_buffer_bytes must be greater than zero".to_string(),
            ));
        }
        if self.benign_markers.iter().any(|marker| marker.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "benign_markers must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}
