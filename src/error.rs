//! Error taxonomy for device access

use thiserror::Error;

/// The kinds of failures that can occur while discovering or talking to a
/// HID device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The device is not connected (or got disconnected mid-transfer).
    DeviceNotConnected,
    /// The device is held exclusively by another process.
    DeviceInUse,
    /// One or more arguments are invalid.
    InvalidArgument,
    /// The operation did not complete within the requested time.
    Timeout,
    /// Any other failure, with a platform-formatted message.
    Other,
}

/// An error paired with a human-readable message.
///
/// Every fallible operation in this crate reports failure through this type;
/// expected conditions (disconnect, contention, timeout, bad arguments) never
/// panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HidError {
    kind: ErrorKind,
    message: String,
}

impl HidError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn device_not_connected() -> Self {
        Self::new(ErrorKind::DeviceNotConnected, "device is not connected")
    }

    pub(crate) fn device_in_use() -> Self {
        Self::new(
            ErrorKind::DeviceInUse,
            "device is being used by another process and cannot be accessed",
        )
    }

    pub(crate) fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "operation timed out")
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub(crate) fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }
}

/// Returned by [`HidContext::new`](crate::HidContext::new) when no backend
/// exists for the current operating system.
///
/// This is a construction-time error: it is the only way an unsupported
/// platform surfaces, so every later call site can assume a working backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("HID device access is not supported on this platform")]
pub struct UnsupportedPlatform;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_is_preserved() {
        let e = HidError::device_in_use();
        assert_eq!(e.kind(), ErrorKind::DeviceInUse);
        let e = HidError::timeout();
        assert_eq!(e.kind(), ErrorKind::Timeout);
        let e = HidError::invalid_argument("bad access mode");
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        assert_eq!(e.message(), "bad access mode");
    }

    #[test]
    fn test_error_displays_message() {
        let e = HidError::new(ErrorKind::Other, "(5) Access is denied.");
        assert_eq!(e.to_string(), "(5) Access is denied.");
    }

    #[test]
    fn test_unsupported_platform_display() {
        let msg = UnsupportedPlatform.to_string();
        assert!(msg.contains("not supported"));
    }
}
