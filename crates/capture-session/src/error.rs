//! Error types for capture session handling

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no capture source found (tried {})", candidates.join(", "))]
    NoSourceFound { candidates: Vec<String> },

    #[error("capture data did not appear at {} within {:?}", root.display(), timeout)]
    ReadyTimeout { root: PathBuf, timeout: Duration },

    #[error("wait for capture data was cancelled")]
    Cancelled,

    #[error("failed to decode {}: {reason}", path.display())]
    DecodeFailure { path: PathBuf, reason: String },

    #[error("cannot derive a frame name from raw file '{0}'")]
    RawName(String),

    #[error("encoder failed ({status}): {stderr}")]
    EncoderFailure { status: String, stderr: String },

    #[error("working area holds a directory that will not be removed: {}", path.display())]
    NestedDirectory { path: PathBuf },

    #[error("cleanup of {} failed: {reason}", path.display())]
    CleanupFailure { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SessionError::DecodeFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encoder(status: Option<ExitStatus>, stderr: impl Into<String>) -> Self {
        SessionError::EncoderFailure {
            status: status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "not started".to_string()),
            stderr: stderr.into(),
        }
    }

    pub(crate) fn cleanup(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        SessionError::CleanupFailure {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
