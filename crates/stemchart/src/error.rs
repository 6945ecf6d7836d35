//! Error types for stemchart
//!
//! Nothing in the session core is fatal. Backend errors degrade a channel
//! to "unavailable"; session errors only surface at the handle boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to open an audio resource
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("audio resource not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
}

impl BackendError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            BackendError::NotFound(path)
        } else {
            BackendError::Io { path, source }
        }
    }
}

/// Errors at the session handle boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("playback session is no longer running")]
    Closed,

    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
