//! Platform backend seam
//!
//! Each supported platform implements the [`RawDeviceIo`] capability set
//! (open, close, write, read) for a single device handle. Supported
//! platforms form the closed [`PlatformIo`] variant rather than an
//! open-ended hierarchy, so adding a backend is an explicit, compile-time
//! decision.

use crate::error::HidError;
use crate::mock::MockDeviceIo;
use crate::types::{DeviceAccess, DeviceDescriptor, Timeout};

/// Raw report transfer against one OS device handle.
///
/// Implementations own the handle and any per-session synchronization
/// primitive, translate OS failures into the crate error taxonomy and
/// release everything deterministically on close or drop. Framing, access
/// validation and auto-open policy live above this trait, in
/// [`DeviceSession`](crate::DeviceSession).
pub(crate) trait RawDeviceIo {
    /// Open the device path non-exclusively in asynchronous mode.
    ///
    /// The caller has already validated `access`.
    fn open(&mut self, path: &str, access: DeviceAccess) -> Result<(), HidError>;

    /// Release the handle. Must be idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Transfer one framed output report, waiting for completion without a
    /// caller-visible bound.
    fn write_report(&mut self, report: &[u8]) -> Result<(), HidError>;

    /// Receive one raw input report into `report`, which is sized to the
    /// device's input report byte length. A wait that expires cancels the
    /// pending transfer before returning a timeout error; data that
    /// completes concurrently with the cancellation is still delivered.
    fn read_report(&mut self, report: &mut [u8], timeout: Timeout) -> Result<(), HidError>;
}

/// Closed set of per-platform raw I/O implementations.
#[derive(Debug)]
pub(crate) enum PlatformIo {
    #[cfg(windows)]
    Windows(crate::windows::WindowsDeviceIo),
    Mock(MockDeviceIo),
}

impl RawDeviceIo for PlatformIo {
    fn open(&mut self, path: &str, access: DeviceAccess) -> Result<(), HidError> {
        match self {
            #[cfg(windows)]
            Self::Windows(io) => io.open(path, access),
            Self::Mock(io) => io.open(path, access),
        }
    }

    fn close(&mut self) {
        match self {
            #[cfg(windows)]
            Self::Windows(io) => io.close(),
            Self::Mock(io) => io.close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            #[cfg(windows)]
            Self::Windows(io) => io.is_open(),
            Self::Mock(io) => io.is_open(),
        }
    }

    fn write_report(&mut self, report: &[u8]) -> Result<(), HidError> {
        match self {
            #[cfg(windows)]
            Self::Windows(io) => io.write_report(report),
            Self::Mock(io) => io.write_report(report),
        }
    }

    fn read_report(&mut self, report: &mut [u8], timeout: Timeout) -> Result<(), HidError> {
        match self {
            #[cfg(windows)]
            Self::Windows(io) => io.read_report(report, timeout),
            Self::Mock(io) => io.read_report(report, timeout),
        }
    }
}

/// Lazy, finite sequence of discovered devices.
///
/// Each element is probed only when requested, so a consumer that stops
/// early never pays for the remaining candidates. Obtain a fresh instance
/// from [`HidContext::enumerate`](crate::HidContext::enumerate) to re-scan.
pub struct DeviceList {
    inner: ListInner,
}

enum ListInner {
    #[cfg(windows)]
    Windows(crate::windows::enumerate::InterfaceWalk),
    Mock(std::vec::IntoIter<DeviceDescriptor>),
    /// The device-class listing itself could not be obtained.
    #[cfg(windows)]
    Empty,
}

impl DeviceList {
    #[cfg(windows)]
    pub(crate) fn windows(walk: Option<crate::windows::enumerate::InterfaceWalk>) -> Self {
        Self {
            inner: match walk {
                Some(walk) => ListInner::Windows(walk),
                None => ListInner::Empty,
            },
        }
    }

    pub(crate) fn mock(descriptors: Vec<DeviceDescriptor>) -> Self {
        Self {
            inner: ListInner::Mock(descriptors.into_iter()),
        }
    }
}

impl Iterator for DeviceList {
    type Item = DeviceDescriptor;

    fn next(&mut self) -> Option<DeviceDescriptor> {
        match &mut self.inner {
            #[cfg(windows)]
            ListInner::Windows(walk) => walk.next(),
            ListInner::Mock(iter) => iter.next(),
            #[cfg(windows)]
            ListInner::Empty => None,
        }
    }
}
