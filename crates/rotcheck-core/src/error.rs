//! Error types for the rotcheck core library

use thiserror::Error;

/// Main error type for rotcheck operations
#[derive(Error, Debug)]
pub enum Error {
    /// An argument violated an engine precondition (e.g. unaligned buffer length)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed size or write directive
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error during read/write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Target file exists and overwriting was not allowed
    #[error("Target already exists: {0}")]
    TargetExists(String),

    /// Target file to verify does not exist
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The file ended before its recorded length was read back
    #[error("Unexpected end of file at offset {offset}: expected {expected} bytes")]
    UnexpectedEof {
        /// Offset where reading stopped
        offset: u64,
        /// Length the file was expected to have
        expected: u64,
    },

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias using the rotcheck error type
pub type Result<T> = std::result::Result<T, Error>;
