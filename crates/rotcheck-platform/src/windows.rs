//! Windows platform implementation
//!
//! Uses `GetDiskFreeSpaceExW`, which honours per-user disk quotas.

use crate::{os_error, Result, SpaceInfo};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

pub(crate) fn query_space(path: &Path) -> Result<SpaceInfo> {
    let wide_path: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut available = 0u64;
    let mut total = 0u64;
    let mut total_free = 0u64;

    // SAFETY: wide_path is NUL-terminated and outlives the call; the out pointers
    // reference live u64 locals.
    #[allow(unsafe_code)]
    let result = unsafe {
        GetDiskFreeSpaceExW(
            wide_path.as_ptr(),
            &mut available,
            &mut total,
            &mut total_free,
        )
    };

    if result == 0 {
        return Err(os_error(path, std::io::Error::last_os_error()));
    }

    Ok(SpaceInfo { available, total })
}
