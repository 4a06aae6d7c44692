//! Common types for device discovery and sessions

use bitflags::bitflags;

/// Description of a discovered HID device.
///
/// Produced by [`HidContext::enumerate`](crate::HidContext::enumerate) and
/// consumed by [`HidContext::create`](crate::HidContext::create) to construct
/// a session for communication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// USB product ID.
    pub product_id: u16,
    /// Manufacturer's revision number.
    pub version_number: u16,
    /// Top-level collection's usage page.
    pub usage_page: u16,
    /// Top-level collection's usage ID.
    pub usage_id: u16,
    /// Maximum size of input reports in bytes, including the report-ID byte
    /// that is prepended to the report data. Always at least 1 on descriptors
    /// yielded by enumeration.
    pub input_report_byte_length: u16,
    /// Maximum size of output reports in bytes, including the report-ID byte.
    /// Always at least 1 on descriptors yielded by enumeration.
    pub output_report_byte_length: u16,
    /// Platform device interface path.
    pub device_path: String,
    /// Serial number, empty if the device did not report one.
    pub serial_number: String,
    /// Manufacturer name, empty if the device did not report one.
    pub manufacturer_string: String,
    /// Product name, empty if the device did not report one.
    pub product_string: String,
}

bitflags! {
    /// Access rights requested when opening a device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceAccess: u32 {
        const READ = 1;
        const WRITE = 2;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl DeviceAccess {
    /// Whether this value is one of the accepted combinations
    /// (`READ`, `WRITE` or `READ_WRITE`).
    pub fn is_valid(self) -> bool {
        !self.is_empty() && Self::READ_WRITE.contains(self)
    }
}

/// Optional exact-match criteria for device enumeration.
///
/// An unset field matches every device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub usage_page: Option<u16>,
    pub usage_id: Option<u16>,
}

impl DeviceFilter {
    /// Match-all filter.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn product_id(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn usage_page(mut self, usage_page: u16) -> Self {
        self.usage_page = Some(usage_page);
        self
    }

    pub fn usage_id(mut self, usage_id: u16) -> Self {
        self.usage_id = Some(usage_id);
        self
    }

    /// Check the vendor/product attributes against the identity criteria.
    pub(crate) fn matches_identity(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|v| v == vendor_id)
            && self.product_id.is_none_or(|p| p == product_id)
    }

    /// Check the capability descriptor against the usage criteria.
    pub(crate) fn matches_usage(&self, usage_page: u16, usage_id: u16) -> bool {
        self.usage_page.is_none_or(|p| p == usage_page)
            && self.usage_id.is_none_or(|u| u == usage_id)
    }
}

/// How long a read may wait for an input report.
///
/// `Millis(0)` polls once and returns immediately when no report is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until a report arrives or a non-timeout error occurs.
    Infinite,
    /// Wait at most this many milliseconds.
    Millis(u32),
}
