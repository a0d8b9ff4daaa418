//! Free space queries backed by the platform crate

use rotcheck_core::FreeSpace;
use std::io;
use std::path::Path;

/// Asks the operating system how much room the target volume has left
pub struct PlatformFreeSpace;

impl FreeSpace for PlatformFreeSpace {
    fn available_bytes(&self, dir: &Path) -> io::Result<u64> {
        rotcheck_platform::available_space(dir).map_err(io::Error::from)
    }
}
