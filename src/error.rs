//! Muxer error types.

use thiserror::Error;

/// Errors that can occur while assembling a container.
#[derive(Error, Debug)]
pub enum MuxError {
    /// A sample was addressed to a track index that was never created.
    #[error("invalid track index: {0}")]
    InvalidTrack(usize),

    /// Sample-table growth or relocation-buffer allocation failed.
    #[error("allocation failed: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),

    /// Any sink read/write/seek failure, carrying the sink's own status.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for mux operations.
pub type MuxResult<T> = Result<T, MuxError>;
