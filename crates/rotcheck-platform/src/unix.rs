//! Unix platform implementation
//!
//! Uses `statvfs(3)`, which Linux, macOS and the BSDs all provide.

use crate::{os_error, PlatformError, Result, SpaceInfo};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

// Field widths differ between platforms
#[allow(clippy::unnecessary_cast)]
pub(crate) fn query_space(path: &Path) -> Result<SpaceInfo> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| PlatformError::InvalidPath(path.display().to_string()))?;

    // SAFETY: statvfs is plain old data, so an all-zero value is valid.
    #[allow(unsafe_code)]
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

    // SAFETY: c_path is a valid NUL-terminated string that outlives the call, and
    // stat points to writable memory of the right type.
    #[allow(unsafe_code)]
    let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };

    if result != 0 {
        return Err(os_error(path, std::io::Error::last_os_error()));
    }

    Ok(space_from_stat(
        stat.f_bavail as u64,
        stat.f_blocks as u64,
        stat.f_frsize as u64,
    ))
}

/// Block counts are in units of the fragment size
fn space_from_stat(available_blocks: u64, total_blocks: u64, fragment_size: u64) -> SpaceInfo {
    SpaceInfo {
        available: available_blocks.saturating_mul(fragment_size),
        total: total_blocks.saturating_mul(fragment_size),
    }
}
