//! HID device-class enumeration
//!
//! Walks the device-interface list for the HID class and probes every
//! candidate path transiently: a zero-access, shared open, the vendor
//! attributes, the parsed capability descriptor and the best-effort device
//! strings. A path that cannot be opened or queried is skipped, never fatal
//! to the scan; with [`set_enumeration_warnings`](crate::set_enumeration_warnings)
//! enabled each skip is reported through `tracing`.

use std::ffi::c_void;
use std::ptr;

use tracing::warn;
use windows_sys::core::GUID;
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
    SetupDiGetDeviceInterfaceDetailW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W,
};
use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_FreePreparsedData, HidD_GetAttributes, HidD_GetHidGuid, HidD_GetManufacturerString,
    HidD_GetPreparsedData, HidD_GetProductString, HidD_GetSerialNumberString, HidP_GetCaps,
    HIDD_ATTRIBUTES, HIDP_CAPS, HIDP_STATUS_SUCCESS, PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{
    ERROR_INSUFFICIENT_BUFFER, ERROR_NO_MORE_ITEMS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

use crate::diagnostics::enumeration_warnings;
use crate::types::{DeviceDescriptor, DeviceFilter};
use crate::windows::error::{format_os_error, last_os_error};
use crate::windows::io::OwnedHandle;
use crate::windows::wide_path;

/// Maximum HID device string length: 126 UTF-16 code units plus the
/// terminating NUL, per the USB string descriptor limit.
const STRING_BUFFER_LEN: usize = 127;

/// Device information set handle, destroyed on drop.
struct DeviceInfoSet(HDEVINFO);

impl DeviceInfoSet {
    fn for_hid_class(guid: &GUID) -> Option<Self> {
        // SAFETY: the GUID reference is valid for the call; no enumerator
        // string and no parent window are supplied.
        let set = unsafe {
            SetupDiGetClassDevsW(
                guid,
                ptr::null(),
                ptr::null_mut(),
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        };
        if set == INVALID_HANDLE_VALUE {
            if enumeration_warnings() {
                warn!(
                    "failed to load device information set: {}",
                    format_os_error(last_os_error())
                );
            }
            return None;
        }
        Some(Self(set))
    }
}

impl Drop for DeviceInfoSet {
    fn drop(&mut self) {
        // SAFETY: the set handle is owned by this wrapper.
        unsafe {
            SetupDiDestroyDeviceInfoList(self.0);
        }
    }
}

/// Preparsed capability data, freed on drop even when the capability query
/// fails.
struct PreparsedData(PHIDP_PREPARSED_DATA);

impl Drop for PreparsedData {
    fn drop(&mut self) {
        // SAFETY: the pointer came from HidD_GetPreparsedData and is freed
        // exactly once.
        if unsafe { HidD_FreePreparsedData(self.0) } == 0 && enumeration_warnings() {
            warn!(
                "failed to free preparsed data: {}",
                format_os_error(last_os_error())
            );
        }
    }
}

/// Lazy walk over the HID device-interface list.
///
/// Each `next` call advances through candidate paths until one passes the
/// filters and yields a full descriptor.
pub(crate) struct InterfaceWalk {
    set: DeviceInfoSet,
    guid: GUID,
    index: u32,
    filter: DeviceFilter,
}

impl InterfaceWalk {
    /// Start a scan. Returns `None` when the device-class listing itself
    /// cannot be obtained, the only case where the whole scan is empty.
    pub(crate) fn new(filter: DeviceFilter) -> Option<Self> {
        let mut guid: GUID = unsafe { std::mem::zeroed() };
        // SAFETY: writes the HID class GUID into `guid`; cannot fail.
        unsafe { HidD_GetHidGuid(&mut guid) };

        let set = DeviceInfoSet::for_hid_class(&guid)?;
        Some(Self {
            set,
            guid,
            index: 0,
            filter,
        })
    }

    /// Retrieve the interface path for the current index, or `None` to skip
    /// this candidate.
    fn interface_path(&self, interface_data: &SP_DEVICE_INTERFACE_DATA) -> Option<String> {
        let mut required_size = 0u32;
        // First call queries the detail record size; it always fails with
        // ERROR_INSUFFICIENT_BUFFER.
        // SAFETY: null detail buffer with zero size is the documented
        // size-query form.
        unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.set.0,
                interface_data,
                ptr::null_mut(),
                0,
                &mut required_size,
                ptr::null_mut(),
            );
        }
        let code = last_os_error();
        if code != ERROR_INSUFFICIENT_BUFFER {
            if enumeration_warnings() {
                warn!(
                    index = self.index,
                    "failed to get device interface detail size: {}",
                    format_os_error(code)
                );
            }
            return None;
        }

        // u32 backing keeps the detail struct's 4-byte alignment.
        let mut buffer = vec![0u32; required_size.div_ceil(4) as usize];
        let detail = buffer.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        // SAFETY: the buffer is at least `required_size` bytes and starts
        // with the detail header whose cbSize must name the fixed part only.
        unsafe {
            (*detail).cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
        }
        // SAFETY: detail points into `buffer`, which outlives the call.
        let ok = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.set.0,
                interface_data,
                detail,
                required_size,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            if enumeration_warnings() {
                warn!(
                    index = self.index,
                    "failed to get device interface detail: {}",
                    format_os_error(last_os_error())
                );
            }
            return None;
        }

        // SAFETY: DevicePath is a NUL-terminated UTF-16 string inside the
        // buffer the OS just filled.
        let path = unsafe {
            let start = ptr::addr_of!((*detail).DevicePath) as *const u16;
            let mut len = 0usize;
            while *start.add(len) != 0 {
                len += 1;
            }
            String::from_utf16_lossy(std::slice::from_raw_parts(start, len))
        };
        Some(path)
    }
}

impl Iterator for InterfaceWalk {
    type Item = DeviceDescriptor;

    fn next(&mut self) -> Option<DeviceDescriptor> {
        loop {
            let mut interface_data: SP_DEVICE_INTERFACE_DATA = unsafe { std::mem::zeroed() };
            interface_data.cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

            // SAFETY: the set handle is live for the lifetime of self.
            let ok = unsafe {
                SetupDiEnumDeviceInterfaces(
                    self.set.0,
                    ptr::null(),
                    &self.guid,
                    self.index,
                    &mut interface_data,
                )
            };
            if ok == 0 {
                let code = last_os_error();
                if code != ERROR_NO_MORE_ITEMS && enumeration_warnings() {
                    warn!(
                        index = self.index,
                        "device interface enumeration stopped: {}",
                        format_os_error(code)
                    );
                }
                return None;
            }
            self.index += 1;

            let Some(path) = self.interface_path(&interface_data) else {
                continue;
            };
            if let Some(descriptor) = probe_path(&path, &self.filter) {
                return Some(descriptor);
            }
        }
    }
}

/// Open one candidate path transiently and assemble its descriptor.
///
/// Returns `None` when the device fails a filter or cannot be queried; the
/// probe handle is released on every exit path by its owner.
fn probe_path(path: &str, filter: &DeviceFilter) -> Option<DeviceDescriptor> {
    let wide = wide_path(path);
    // Zero access rights: many devices reject READ/WRITE but still permit
    // attribute queries, and the probe must never exclude other processes.
    // SAFETY: `wide` is NUL-terminated and outlives the call.
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            ptr::null(),
            OPEN_EXISTING,
            0,
            ptr::null_mut(),
        )
    };
    let Some(handle) = OwnedHandle::from_raw(handle) else {
        // Likely disconnected meanwhile, or held with exclusive share mode.
        if enumeration_warnings() {
            warn!(
                path,
                "failed to open device: {}",
                format_os_error(last_os_error())
            );
        }
        return None;
    };

    let mut attributes: HIDD_ATTRIBUTES = unsafe { std::mem::zeroed() };
    attributes.Size = std::mem::size_of::<HIDD_ATTRIBUTES>() as u32;
    // SAFETY: `attributes` is sized and writable.
    if unsafe { HidD_GetAttributes(handle.raw(), &mut attributes) } == 0 {
        if enumeration_warnings() {
            warn!(
                path,
                "failed to get attributes: {}",
                format_os_error(last_os_error())
            );
        }
        return None;
    }

    if !filter.matches_identity(attributes.VendorID, attributes.ProductID) {
        return None; // not an error, just not the device asked for
    }

    let caps = query_caps(handle.raw(), path)?;
    if !filter.matches_usage(caps.UsagePage, caps.Usage) {
        return None;
    }

    let serial_number = query_string(handle.raw(), path, HidD_GetSerialNumberString, "serial number");
    let manufacturer_string =
        query_string(handle.raw(), path, HidD_GetManufacturerString, "manufacturer string");
    let product_string = query_string(handle.raw(), path, HidD_GetProductString, "product string");

    Some(DeviceDescriptor {
        vendor_id: attributes.VendorID,
        product_id: attributes.ProductID,
        version_number: attributes.VersionNumber,
        usage_page: caps.UsagePage,
        usage_id: caps.Usage,
        input_report_byte_length: caps.InputReportByteLength,
        output_report_byte_length: caps.OutputReportByteLength,
        device_path: path.to_string(),
        serial_number,
        manufacturer_string,
        product_string,
    })
}

/// Two-step capability query; the preparsed data is freed by its guard even
/// when HidP_GetCaps fails.
fn query_caps(handle: HANDLE, path: &str) -> Option<HIDP_CAPS> {
    let mut preparsed: PHIDP_PREPARSED_DATA = unsafe { std::mem::zeroed() };
    // SAFETY: writes the preparsed-data pointer on success.
    if unsafe { HidD_GetPreparsedData(handle, &mut preparsed) } == 0 {
        if enumeration_warnings() {
            warn!(
                path,
                "failed to get preparsed data: {}",
                format_os_error(last_os_error())
            );
        }
        return None;
    }
    let preparsed = PreparsedData(preparsed);

    let mut caps: HIDP_CAPS = unsafe { std::mem::zeroed() };
    // SAFETY: `caps` is sized and writable; the preparsed pointer is live.
    if unsafe { HidP_GetCaps(preparsed.0, &mut caps) } != HIDP_STATUS_SUCCESS {
        if enumeration_warnings() {
            warn!(path, "failed to get device capabilities");
        }
        return None;
    }
    Some(caps)
}

/// Best-effort device string query. A failure yields an empty string and a
/// warning; it never aborts the descriptor.
fn query_string(
    handle: HANDLE,
    path: &str,
    query: unsafe extern "system" fn(HANDLE, *mut c_void, u32) -> u8,
    which: &str,
) -> String {
    let mut buffer = [0u16; STRING_BUFFER_LEN];
    // SAFETY: the buffer length is passed in bytes; the OS writes a
    // NUL-terminated UTF-16 string on success.
    let ok = unsafe {
        query(
            handle,
            buffer.as_mut_ptr() as *mut c_void,
            (buffer.len() * std::mem::size_of::<u16>()) as u32,
        )
    };
    if ok == 0 {
        if enumeration_warnings() {
            warn!(
                path,
                "failed to get {which}: {}",
                format_os_error(last_os_error())
            );
        }
        return String::new();
    }

    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}
