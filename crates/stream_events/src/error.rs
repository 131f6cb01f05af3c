use std::error::Error;
use std::io;

use thiserror::Error;

/// Errors surfaced to the owner of a reader through [`crate::ReaderHandle::close`].
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to close event source: {0}")]
    Close(#[source] io::Error),
    #[error("event source already closed")]
    AlreadyClosed,
}

/// Failure reported by an [`crate::EventSink`].
///
/// The read loop logs these and keeps going; they never alter control flow.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event rejected: {0}")]
    Rejected(String),
    #[error("sink closed")]
    Closed,
    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

impl SinkError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Why a single frame was dropped instead of delivered.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{source} while decoding {raw}")]
    Decode {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
    #[error("frame too long (observed_bytes={observed_bytes}, max_frame_bytes={max_frame_bytes})")]
    TooLong {
        observed_bytes: usize,
        max_frame_bytes: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse reader config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid reader config: {0}")]
    Invalid(String),
}
