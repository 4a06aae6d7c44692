//! Report-level HID device discovery and I/O.
//!
//! The entry point is [`HidContext`]: it enumerates connected HID devices
//! against an optional [`DeviceFilter`] and creates a [`DeviceSession`] for
//! any descriptor the scan yields. Sessions exchange fixed-size reports with
//! the device; the report-ID framing byte is handled internally, so callers
//! only ever see payload bytes.
//!
//! Sessions open themselves on demand: a [`write`](DeviceSession::write) or
//! [`read`](DeviceSession::read) on a closed session opens the device for
//! the duration of the call, while an explicit [`open`](DeviceSession::open)
//! keeps the handle across transfers. Reads take a [`Timeout`] and cancel
//! the in-flight transfer when it expires.
//!
//! ```no_run
//! use hidlink::{DeviceFilter, HidContext, Timeout};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hid = HidContext::new()?;
//! let filter = DeviceFilter::any().vendor_id(0x3151).usage_page(0xFF00);
//!
//! for descriptor in hid.enumerate(filter) {
//!     let mut session = hid.create(&descriptor)?;
//!     session.write(&[0x01, 0x02, 0x03])?;
//!     let reply = session.read(Timeout::Millis(500))?;
//!     println!("{} replied with {} bytes", descriptor.product_string, reply.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All expected failure modes (disconnects, contention, timeouts, bad
//! arguments) surface as [`HidError`] values; see [`ErrorKind`] for the
//! taxonomy.

mod backend;
mod diagnostics;
mod error;
#[doc(hidden)]
pub mod mock;
mod report;
mod session;
mod types;
#[cfg(windows)]
mod windows;

pub use backend::DeviceList;
pub use diagnostics::{enumeration_warnings, set_enumeration_warnings};
pub use error::{ErrorKind, HidError, UnsupportedPlatform};
pub use session::DeviceSession;
pub use types::{DeviceAccess, DeviceDescriptor, DeviceFilter, Timeout};

use backend::PlatformIo;
use mock::MockHid;

enum Backend {
    #[cfg(windows)]
    Windows,
    Mock(MockHid),
}

/// Access point for device discovery and session creation.
///
/// Construction fails with [`UnsupportedPlatform`] when no backend exists
/// for the current operating system, so everything downstream of a live
/// context can assume a working backend.
pub struct HidContext {
    backend: Backend,
}

impl HidContext {
    /// Create a context for the current platform.
    pub fn new() -> Result<Self, UnsupportedPlatform> {
        #[cfg(windows)]
        {
            Ok(Self {
                backend: Backend::Windows,
            })
        }
        #[cfg(not(windows))]
        {
            Err(UnsupportedPlatform)
        }
    }

    /// Context backed by scripted in-memory devices.
    #[doc(hidden)]
    pub fn with_mock(mock: MockHid) -> Self {
        Self {
            backend: Backend::Mock(mock),
        }
    }

    /// Scan the connected HID devices that match `filter`.
    ///
    /// The scan is lazy: each device is probed when the iterator is
    /// advanced. Devices that cannot be opened or queried are skipped, not
    /// fatal; enable [`set_enumeration_warnings`] to see why a device was
    /// passed over. Call again for a fresh scan.
    pub fn enumerate(&self, filter: DeviceFilter) -> DeviceList {
        match &self.backend {
            #[cfg(windows)]
            Backend::Windows => DeviceList::windows(windows::enumerate::InterfaceWalk::new(filter)),
            Backend::Mock(mock) => DeviceList::mock(mock.enumerate(&filter)),
        }
    }

    /// Create a session for a discovered device.
    ///
    /// The session starts closed; no device I/O happens here.
    pub fn create(&self, descriptor: &DeviceDescriptor) -> Result<DeviceSession, HidError> {
        let io = match &self.backend {
            #[cfg(windows)]
            Backend::Windows => PlatformIo::Windows(windows::WindowsDeviceIo::new()?),
            Backend::Mock(mock) => {
                let io = mock.io_for(&descriptor.device_path).ok_or_else(|| {
                    HidError::invalid_argument(format!(
                        "unknown device path: {}",
                        descriptor.device_path
                    ))
                })?;
                PlatformIo::Mock(io)
            }
        };
        Ok(DeviceSession::new(descriptor.clone(), io))
    }
}
