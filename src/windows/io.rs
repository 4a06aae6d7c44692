//! Overlapped report transfer
//!
//! One [`WindowsDeviceIo`] owns one file handle plus one manual-reset event
//! that is created at construction and reused by every transfer for the
//! session's lifetime. Only a single operation is ever in flight: each call
//! issues one overlapped request and waits (bounded for reads, unbounded for
//! writes) for its completion.

use std::ffi::c_void;
use std::ptr;

use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_IO_INCOMPLETE, ERROR_IO_PENDING, ERROR_NOT_FOUND, GENERIC_READ,
    GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE, WAIT_TIMEOUT,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_FLAG_OVERLAPPED, FILE_SHARE_READ, FILE_SHARE_WRITE,
    OPEN_EXISTING,
};
use windows_sys::Win32::System::Threading::{CreateEventW, INFINITE};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResultEx, OVERLAPPED};

use crate::backend::RawDeviceIo;
use crate::error::HidError;
use crate::types::{DeviceAccess, Timeout};
use crate::windows::error::{last_os_error, translate_io_error, translate_open_error};
use crate::windows::wide_path;

/// Owned Win32 handle, released on drop.
#[derive(Debug)]
pub(crate) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// Wrap a handle returned by the OS, treating INVALID_HANDLE_VALUE as
    /// the failure sentinel.
    pub(crate) fn from_raw(handle: HANDLE) -> Option<Self> {
        if handle == INVALID_HANDLE_VALUE || handle.is_null() {
            None
        } else {
            Some(Self(handle))
        }
    }

    pub(crate) fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this wrapper and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

// Raw handles are plain kernel object references; this type is used from a
// single owner at a time.
unsafe impl Send for OwnedHandle {}

impl Timeout {
    /// Win32 wait bound in milliseconds. `Millis` saturates just below the
    /// INFINITE sentinel so a caller-supplied u32::MAX stays a bounded wait.
    fn as_win32(self) -> u32 {
        match self {
            Timeout::Infinite => INFINITE,
            Timeout::Millis(ms) => ms.min(INFINITE - 1),
        }
    }
}

/// Raw overlapped I/O against one HID device handle.
#[derive(Debug)]
pub struct WindowsDeviceIo {
    handle: Option<OwnedHandle>,
    /// Manual-reset completion event, reused across every transfer.
    event: OwnedHandle,
}

impl WindowsDeviceIo {
    pub(crate) fn new() -> Result<Self, HidError> {
        // SAFETY: all-null arguments request an anonymous manual-reset,
        // initially non-signaled event.
        let event = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        let event = OwnedHandle::from_raw(event).ok_or_else(|| {
            HidError::other(format!(
                "failed to create completion event: {}",
                crate::windows::error::format_os_error(last_os_error())
            ))
        })?;
        Ok(Self {
            handle: None,
            event,
        })
    }

    fn overlapped(&self) -> OVERLAPPED {
        // SAFETY: OVERLAPPED is a plain C struct; all-zero is its documented
        // idle state.
        let mut ov: OVERLAPPED = unsafe { std::mem::zeroed() };
        ov.hEvent = self.event.raw();
        ov
    }

    fn open_handle(&self) -> Result<HANDLE, HidError> {
        self.handle
            .as_ref()
            .map(OwnedHandle::raw)
            .ok_or_else(|| HidError::other("device is not open"))
    }
}

impl RawDeviceIo for WindowsDeviceIo {
    fn open(&mut self, path: &str, access: DeviceAccess) -> Result<(), HidError> {
        let mut desired_access = 0u32;
        if access.contains(DeviceAccess::READ) {
            desired_access |= GENERIC_READ;
        }
        if access.contains(DeviceAccess::WRITE) {
            desired_access |= GENERIC_WRITE;
        }

        let wide = wide_path(path);
        // SAFETY: `wide` is NUL-terminated and outlives the call. The share
        // mode always permits concurrent read/write by other processes.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                desired_access,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };

        match OwnedHandle::from_raw(handle) {
            Some(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            None => Err(translate_open_error(last_os_error())),
        }
    }

    fn close(&mut self) {
        self.handle = None;
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn write_report(&mut self, report: &[u8]) -> Result<(), HidError> {
        let handle = self.open_handle()?;
        let mut ov = self.overlapped();

        // SAFETY: `report` and `ov` stay alive until the transfer is
        // observed complete below.
        let ok = unsafe {
            WriteFile(
                handle,
                report.as_ptr() as *const c_void,
                report.len() as u32,
                ptr::null_mut(),
                &mut ov,
            )
        };
        if ok != 0 {
            return Ok(()); // completed synchronously
        }

        let code = last_os_error();
        if code != ERROR_IO_PENDING {
            return Err(translate_io_error(code, "write report"));
        }

        let mut transferred = 0u32;
        // SAFETY: waits on the event stored in `ov`; no alertable wait.
        let ok = unsafe { GetOverlappedResultEx(handle, &ov, &mut transferred, INFINITE, 0) };
        if ok == 0 {
            return Err(translate_io_error(last_os_error(), "write report"));
        }
        debug_assert_eq!(transferred as usize, report.len());
        Ok(())
    }

    fn read_report(&mut self, report: &mut [u8], timeout: Timeout) -> Result<(), HidError> {
        let handle = self.open_handle()?;
        let mut ov = self.overlapped();

        // SAFETY: `report` and `ov` stay alive until the transfer is
        // observed complete or drained after cancellation below.
        let ok = unsafe {
            ReadFile(
                handle,
                report.as_mut_ptr() as *mut c_void,
                report.len() as u32,
                ptr::null_mut(),
                &mut ov,
            )
        };
        if ok != 0 {
            return Ok(()); // completed synchronously
        }

        let code = last_os_error();
        if code != ERROR_IO_PENDING {
            return Err(translate_io_error(code, "read report"));
        }

        let mut transferred = 0u32;
        // SAFETY: bounded wait on the completion event.
        let ok =
            unsafe { GetOverlappedResultEx(handle, &ov, &mut transferred, timeout.as_win32(), 0) };
        if ok != 0 {
            debug_assert_eq!(transferred as usize, report.len());
            return Ok(());
        }

        let code = last_os_error();
        // WAIT_TIMEOUT: the bounded wait expired.
        // ERROR_IO_INCOMPLETE: zero timeout and the operation is still in
        // progress. Everything else is a genuine transfer failure.
        if code != WAIT_TIMEOUT && code != ERROR_IO_INCOMPLETE {
            return Err(translate_io_error(code, "read report"));
        }

        // The pending request must not be left outstanding on the handle.
        // SAFETY: cancels only the request identified by `ov`.
        if unsafe { CancelIoEx(handle, &ov) } != 0 {
            // Drain the cancelled request so the kernel is finished with
            // `ov` and `report` before either is reused.
            let _ =
                unsafe { GetOverlappedResultEx(handle, &ov, &mut transferred, INFINITE, 0) };
            return Err(HidError::timeout());
        }

        match last_os_error() {
            ERROR_NOT_FOUND => {
                // The transfer finished in the instant before the cancel
                // landed; fetch the result instead of reporting a spurious
                // timeout.
                // SAFETY: zero-wait completion query on the same request.
                let ok = unsafe { GetOverlappedResultEx(handle, &ov, &mut transferred, 0, 0) };
                if ok == 0 {
                    return Err(translate_io_error(last_os_error(), "read report"));
                }
                debug_assert_eq!(transferred as usize, report.len());
                Ok(())
            }
            code => Err(HidError::other(format!(
                "failed to cancel pending read: {}",
                crate::windows::error::format_os_error(code)
            ))),
        }
    }
}
