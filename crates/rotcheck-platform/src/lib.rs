//! # Rotcheck Platform
//!
//! Platform-specific free space queries.
//!
//! Fill mode needs to know how many bytes the volume holding the target file can
//! still accept. This crate answers that question with `statvfs` on Unix and
//! `GetDiskFreeSpaceExW` on Windows. Both report the space available to the
//! calling user, which excludes blocks reserved for root.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::Path;
use thiserror::Error;

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path does not exist
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Path cannot be passed to the operating system
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Operation not supported on this platform
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<PlatformError> for std::io::Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Io(e) => e,
            PlatformError::NotFound(msg) => std::io::Error::new(std::io::ErrorKind::NotFound, msg),
            PlatformError::InvalidPath(msg) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
            }
            PlatformError::NotSupported(msg) => {
                std::io::Error::new(std::io::ErrorKind::Unsupported, msg)
            }
        }
    }
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Capacity of the volume holding a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceInfo {
    /// Bytes the calling user can still write
    pub available: u64,

    /// Total size of the volume in bytes
    pub total: u64,
}

impl SpaceInfo {
    /// Bytes already in use (including space reserved for other users)
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

/// Convert an OS error for `path` into a [`PlatformError`]
pub(crate) fn os_error(path: &Path, err: std::io::Error) -> PlatformError {
    match err.kind() {
        std::io::ErrorKind::NotFound => PlatformError::NotFound(path.display().to_string()),
        _ => PlatformError::Io(err),
    }
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix::query_space;
    } else if #[cfg(windows)] {
        mod windows;
        use windows::query_space;
    } else {
        fn query_space(_path: &Path) -> Result<SpaceInfo> {
            Err(PlatformError::NotSupported("Platform not supported".to_string()))
        }
    }
}

/// Query capacity of the volume holding `path` (a file or directory that exists)
pub fn space_info(path: &Path) -> Result<SpaceInfo> {
    let info = query_space(path)?;
    tracing::trace!(
        "Space on {:?}: {} available of {}",
        path,
        info.available,
        info.total
    );
    Ok(info)
}

/// Bytes the calling user can still write to the volume holding `path`
pub fn available_space(path: &Path) -> Result<u64> {
    space_info(path).map(|info| info.available)
}

// ============================================================================
// UNIT TESTS
// ============================================================================
