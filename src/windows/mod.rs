//! Windows backend
//!
//! Device discovery goes through the SetupDi device-interface APIs and the
//! HidD/HidP family; report transfer uses overlapped file I/O so reads can
//! be cancelled when a wait expires.

pub(crate) mod enumerate;
pub(crate) mod error;
pub(crate) mod io;

pub(crate) use io::WindowsDeviceIo;

/// NUL-terminated UTF-16 form of a device interface path.
pub(crate) fn wide_path(path: &str) -> Vec<u16> {
    path.encode_utf16().chain(std::iter::once(0)).collect()
}
