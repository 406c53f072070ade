//! Common error types for the pedal identification service

use thiserror::Error;

/// Common result type for pedal-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the workspace
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (malformed data URI, unsupported image type)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Action not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Another identification request is already outstanding
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Identification result could not be decoded
    #[error("Malformed result: {0}")]
    MalformedResult(String),
}
