//! Report framing
//!
//! HID reports travel as fixed-length buffers whose first byte is the
//! report ID. This crate always uses the implicit report ID 0: outbound
//! payloads get a zero byte prepended, inbound buffers get their first byte
//! stripped before the data reaches the caller.

/// Frame `output` into `report`, whose length must equal the device's
/// output report byte length.
///
/// Byte 0 becomes the report ID (0), the payload fills bytes 1.. and is
/// silently truncated to at most `report.len() - 1` bytes. Unused trailing
/// bytes are zeroed.
pub(crate) fn frame_output(output: &[u8], report: &mut [u8]) {
    debug_assert!(!report.is_empty());
    report.fill(0);
    let payload_len = output.len().min(report.len() - 1);
    report[1..1 + payload_len].copy_from_slice(&output[..payload_len]);
}

/// Strip the report-ID byte from a received report.
///
/// The returned slice is exactly one byte shorter than the raw transfer.
pub(crate) fn unframe_input(report: &[u8]) -> &[u8] {
    debug_assert!(!report.is_empty());
    &report[1..]
}
