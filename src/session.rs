//! Device I/O session
//!
//! A [`DeviceSession`] owns one OS device handle and drives framed report
//! transfers against it. Sessions are single-threaded by design: one
//! operation is in flight at a time, and concurrent use from multiple
//! threads must be serialized by the caller.

use tracing::warn;

use crate::backend::{PlatformIo, RawDeviceIo};
use crate::error::{ErrorKind, HidError};
use crate::report;
use crate::types::{DeviceAccess, DeviceDescriptor, Timeout};

/// A communication session with one HID device.
///
/// Created from a [`DeviceDescriptor`] via
/// [`HidContext::create`](crate::HidContext::create). The session starts
/// closed; [`write`](Self::write) and [`read`](Self::read) open it
/// transiently when needed, so explicit [`open`](Self::open) is only
/// required to keep the handle across several transfers.
///
/// The handle is released deterministically on [`close`](Self::close) or
/// drop, and forced closed when a transfer reports that the device is gone,
/// so a later call reopens instead of failing against a stale handle.
#[derive(Debug)]
pub struct DeviceSession {
    descriptor: DeviceDescriptor,
    io: PlatformIo,
    /// Outbound frame, sized once to the descriptor's output report length.
    write_buf: Vec<u8>,
    /// Inbound frame, sized once to the descriptor's input report length.
    read_buf: Vec<u8>,
    last_error: Option<HidError>,
}

impl DeviceSession {
    pub(crate) fn new(descriptor: DeviceDescriptor, io: PlatformIo) -> Self {
        let write_buf = vec![0u8; descriptor.output_report_byte_length.max(1) as usize];
        let read_buf = vec![0u8; descriptor.input_report_byte_length.max(1) as usize];
        Self {
            descriptor,
            io,
            write_buf,
            read_buf,
            last_error: None,
        }
    }

    /// The descriptor this session was created from.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn is_open(&self) -> bool {
        self.io.is_open()
    }

    /// Open the device with the given access rights.
    ///
    /// Succeeds as a no-op when already open. Access values other than
    /// `READ`, `WRITE` and `READ_WRITE` are rejected as
    /// [`ErrorKind::InvalidArgument`] before any OS call.
    pub fn open(&mut self, access: DeviceAccess) -> Result<(), HidError> {
        if self.io.is_open() {
            return Ok(());
        }
        if !access.is_valid() {
            return Err(HidError::invalid_argument("invalid device access mode"));
        }
        self.io.open(&self.descriptor.device_path, access)
    }

    /// Open the device with read/write access.
    pub fn open_default(&mut self) -> Result<(), HidError> {
        self.open(DeviceAccess::READ_WRITE)
    }

    /// Close the device. No-op when already closed.
    pub fn close(&mut self) {
        self.io.close();
    }

    /// Send an output report.
    ///
    /// The report-ID byte is prepended automatically, so at most
    /// `output_report_byte_length - 1` bytes of `output` are transferred;
    /// exceeding bytes are trimmed silently and shorter payloads are
    /// zero-padded to the full report length.
    ///
    /// A closed session is opened with `WRITE` access for the duration of
    /// the call. The write waits for completion without a caller timeout: it
    /// either fully transfers the framed report or returns an error.
    pub fn write(&mut self, output: &[u8]) -> Result<(), HidError> {
        let transient = !self.io.is_open();
        if transient {
            self.open(DeviceAccess::WRITE)?;
        }

        report::frame_output(output, &mut self.write_buf);
        let result = self.io.write_report(&self.write_buf);
        self.release_after(transient, result)
    }

    /// Receive an input report, waiting up to `timeout`.
    ///
    /// On success the report-ID byte is stripped, so the returned buffer is
    /// always exactly `input_report_byte_length - 1` bytes; there are no
    /// partial reads. A wait that expires cancels the in-flight transfer and
    /// reports [`ErrorKind::Timeout`], except when the data arrived in the
    /// instant before cancellation, in which case it is returned normally.
    ///
    /// A closed session is opened with `READ` access for the duration of
    /// the call.
    pub fn read(&mut self, timeout: Timeout) -> Result<Vec<u8>, HidError> {
        let transient = !self.io.is_open();
        if transient {
            self.open(DeviceAccess::READ)?;
        }

        let result = self.io.read_report(&mut self.read_buf, timeout);
        let data = self
            .release_after(transient, result)
            .map(|()| report::unframe_input(&self.read_buf).to_vec())?;
        Ok(data)
    }

    /// Receive an input report into `destination`, waiting up to `timeout`.
    ///
    /// Copies at most `destination.len()` bytes of unframed data and returns
    /// the number of bytes copied. Semantics otherwise match
    /// [`read`](Self::read).
    pub fn read_into(
        &mut self,
        destination: &mut [u8],
        timeout: Timeout,
    ) -> Result<usize, HidError> {
        let transient = !self.io.is_open();
        if transient {
            self.open(DeviceAccess::READ)?;
        }

        let result = self.io.read_report(&mut self.read_buf, timeout);
        self.release_after(transient, result)?;

        let data = report::unframe_input(&self.read_buf);
        let n = data.len().min(destination.len());
        destination[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    /// Boolean-returning variant of [`open`](Self::open); the failure, if
    /// any, is available through [`last_error`](Self::last_error).
    pub fn try_open(&mut self, access: DeviceAccess) -> bool {
        match self.open(access) {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(error) => {
                self.last_error = Some(error);
                false
            }
        }
    }

    /// Boolean-returning variant of [`write`](Self::write).
    pub fn try_write(&mut self, output: &[u8]) -> bool {
        match self.write(output) {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(error) => {
                self.last_error = Some(error);
                false
            }
        }
    }

    /// Option-returning variant of [`read`](Self::read).
    pub fn try_read(&mut self, timeout: Timeout) -> Option<Vec<u8>> {
        match self.read(timeout) {
            Ok(data) => {
                self.last_error = None;
                Some(data)
            }
            Err(error) => {
                self.last_error = Some(error);
                None
            }
        }
    }

    /// The error recorded by the most recent failed `try_*` call.
    pub fn last_error(&self) -> Option<&HidError> {
        self.last_error.as_ref()
    }

    /// Close the handle after a transfer when the session was opened
    /// transiently, and unconditionally when the device is gone.
    fn release_after(
        &mut self,
        transient: bool,
        result: Result<(), HidError>,
    ) -> Result<(), HidError> {
        let disconnected = matches!(&result, Err(e) if e.kind() == ErrorKind::DeviceNotConnected);
        if disconnected {
            warn!(
                path = %self.descriptor.device_path,
                "device disconnected, session closed"
            );
        }
        if transient || disconnected {
            self.io.close();
        }
        result
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}
