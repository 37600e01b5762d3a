//! Error types for timestamp parsing and duration reconstruction

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimingError {
    /// The log has no rows, or only the baseline row, so no delta exists
    #[error("timestamp log has no frames after the baseline row")]
    EmptyLog,

    #[error("malformed timestamp row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TimingResult<T> = Result<T, TimingError>;
