//! In-memory backend for tests
//!
//! Lets the session and enumeration logic run on hosts without HID hardware
//! (and without a Windows backend at all). Always compiled, hidden from the
//! public docs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::backend::RawDeviceIo;
use crate::error::HidError;
use crate::types::{DeviceAccess, DeviceDescriptor, DeviceFilter, Timeout};

/// Build a descriptor with sensible defaults for tests.
pub fn descriptor(
    vendor_id: u16,
    product_id: u16,
    usage_page: u16,
    usage_id: u16,
    input_report_byte_length: u16,
    output_report_byte_length: u16,
    device_path: &str,
) -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id,
        product_id,
        version_number: 0x0100,
        usage_page,
        usage_id,
        input_report_byte_length,
        output_report_byte_length,
        device_path: device_path.to_string(),
        serial_number: String::new(),
        manufacturer_string: "Mock Labs".to_string(),
        product_string: "Mock Device".to_string(),
    }
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    open_count: u32,
    close_count: u32,
    last_access: Option<DeviceAccess>,
    /// Raw input reports (report-ID byte included) delivered in order.
    input_queue: VecDeque<Vec<u8>>,
    /// A report that "completes" only in the instant between timeout expiry
    /// and cancellation of the pending read.
    race_input: Option<Vec<u8>>,
    /// Framed output reports the session transferred.
    written: Vec<Vec<u8>>,
    fail_open: Option<HidError>,
    fail_next_write: Option<HidError>,
    fail_next_read: Option<HidError>,
}

#[derive(Debug)]
struct MockDevice {
    descriptor: DeviceDescriptor,
    state: Mutex<MockState>,
}

/// Scripting and inspection handle for one mock device.
#[derive(Clone)]
pub struct MockDeviceHandle {
    shared: Arc<MockDevice>,
}

impl MockDeviceHandle {
    /// Queue a raw input report for the next reads. Padded or truncated to
    /// the descriptor's input report byte length, like real transfers.
    pub fn queue_input(&self, report: &[u8]) {
        let len = self.shared.descriptor.input_report_byte_length as usize;
        let mut raw = vec![0u8; len];
        let n = report.len().min(len);
        raw[..n].copy_from_slice(&report[..n]);
        self.state().input_queue.push_back(raw);
    }

    /// Queue a raw input report that arrives only after a bounded wait has
    /// already expired, exercising the cancel/complete race.
    pub fn queue_race_input(&self, report: &[u8]) {
        let len = self.shared.descriptor.input_report_byte_length as usize;
        let mut raw = vec![0u8; len];
        let n = report.len().min(len);
        raw[..n].copy_from_slice(&report[..n]);
        self.state().race_input = Some(raw);
    }

    /// Make the next open attempt fail with `error`.
    pub fn fail_open(&self, error: HidError) {
        self.state().fail_open = Some(error);
    }

    /// Make the next write fail with `error`.
    pub fn fail_next_write(&self, error: HidError) {
        self.state().fail_next_write = Some(error);
    }

    /// Make the next read fail with `error`.
    pub fn fail_next_read(&self, error: HidError) {
        self.state().fail_next_read = Some(error);
    }

    /// Framed output reports written so far (report-ID byte included).
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state().written.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn open_count(&self) -> u32 {
        self.state().open_count
    }

    pub fn close_count(&self) -> u32 {
        self.state().close_count
    }

    /// Access flags used by the most recent open.
    pub fn last_access(&self) -> Option<DeviceAccess> {
        self.state().last_access
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.shared.state.lock().unwrap()
    }
}

/// A collection of scripted devices standing in for the OS device list.
#[derive(Clone, Default)]
pub struct MockHid {
    devices: Arc<Mutex<Vec<Arc<MockDevice>>>>,
}

impl MockHid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return its scripting handle.
    pub fn add_device(&self, descriptor: DeviceDescriptor) -> MockDeviceHandle {
        let shared = Arc::new(MockDevice {
            descriptor,
            state: Mutex::new(MockState::default()),
        });
        self.devices.lock().unwrap().push(shared.clone());
        MockDeviceHandle { shared }
    }

    pub(crate) fn enumerate(&self, filter: &DeviceFilter) -> Vec<DeviceDescriptor> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .map(|d| &d.descriptor)
            .filter(|d| filter.matches_identity(d.vendor_id, d.product_id))
            .filter(|d| filter.matches_usage(d.usage_page, d.usage_id))
            .cloned()
            .collect()
    }

    pub(crate) fn io_for(&self, device_path: &str) -> Option<MockDeviceIo> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.descriptor.device_path == device_path)
            .map(|shared| MockDeviceIo {
                shared: shared.clone(),
                open: false,
            })
    }
}

/// Raw I/O implementation backed by a scripted [`MockDevice`].
#[derive(Debug)]
pub struct MockDeviceIo {
    shared: Arc<MockDevice>,
    open: bool,
}

impl MockDeviceIo {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.shared.state.lock().unwrap()
    }
}

impl RawDeviceIo for MockDeviceIo {
    fn open(&mut self, _path: &str, access: DeviceAccess) -> Result<(), HidError> {
        let mut state = self.state();
        if let Some(error) = state.fail_open.take() {
            return Err(error);
        }
        state.open = true;
        state.open_count += 1;
        state.last_access = Some(access);
        drop(state);
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        let mut state = self.state();
        state.open = false;
        state.close_count += 1;
        drop(state);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_report(&mut self, report: &[u8]) -> Result<(), HidError> {
        let mut state = self.state();
        if let Some(error) = state.fail_next_write.take() {
            return Err(error);
        }
        state.written.push(report.to_vec());
        Ok(())
    }

    fn read_report(&mut self, report: &mut [u8], timeout: Timeout) -> Result<(), HidError> {
        let mut state = self.state();
        if let Some(error) = state.fail_next_read.take() {
            return Err(error);
        }
        if let Some(raw) = state.input_queue.pop_front() {
            let n = raw.len().min(report.len());
            report[..n].copy_from_slice(&raw[..n]);
            return Ok(());
        }
        match timeout {
            Timeout::Infinite => Err(HidError::other(
                "mock device: unbounded read with no queued input",
            )),
            Timeout::Millis(_) => {
                // The wait expired; if a report raced the cancellation it is
                // still delivered, mirroring the platform behavior.
                if let Some(raw) = state.race_input.take() {
                    let n = raw.len().min(report.len());
                    report[..n].copy_from_slice(&raw[..n]);
                    return Ok(());
                }
                Err(HidError::timeout())
            }
        }
    }
}

impl Drop for MockDeviceIo {
    fn drop(&mut self) {
        self.close();
    }
}
