//! Win32 error translation
//!
//! Maps the status codes this crate can encounter onto the closed
//! [`ErrorKind`] taxonomy. Anything unrecognized becomes
//! [`ErrorKind::Other`] carrying the system-formatted `(code) description`
//! message.

use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_DEVICE_NOT_CONNECTED, ERROR_FILE_NOT_FOUND, ERROR_SHARING_VIOLATION,
};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};

use crate::error::HidError;

pub(crate) fn last_os_error() -> u32 {
    // SAFETY: trivial thread-local query.
    unsafe { GetLastError() }
}

/// Render an OS status code as `(code) description`.
pub(crate) fn format_os_error(code: u32) -> String {
    let mut buffer = [0u16; 512];
    // SAFETY: the buffer is writable for its full length; the system copies
    // at most `nSize` code units and returns how many it wrote.
    let written = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            std::ptr::null(),
            code,
            0,
            buffer.as_mut_ptr(),
            buffer.len() as u32,
            std::ptr::null(),
        )
    } as usize;

    // FormatMessageW fails for codes outside the system message table.
    if written == 0 {
        return format!("({code}) unknown error");
    }

    let description = String::from_utf16_lossy(&buffer[..written]);
    format!("({code}) {}", description.trim_end())
}

/// Translate a failed non-exclusive open of a device path.
pub(crate) fn translate_open_error(code: u32) -> HidError {
    match code {
        ERROR_FILE_NOT_FOUND => HidError::device_not_connected(),
        ERROR_SHARING_VIOLATION => HidError::device_in_use(),
        _ => HidError::other(format_os_error(code)),
    }
}

/// Translate a failed report transfer. `operation` names the transfer for
/// the message ("write report" / "read report").
pub(crate) fn translate_io_error(code: u32, operation: &str) -> HidError {
    match code {
        ERROR_DEVICE_NOT_CONNECTED => HidError::device_not_connected(),
        _ => HidError::other(format!(
            "failed to {operation}: {}",
            format_os_error(code)
        )),
    }
}
