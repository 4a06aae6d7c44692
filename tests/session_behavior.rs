//! End-to-end session behavior against scripted in-memory devices.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use hidlink::mock::{descriptor, MockHid};
use hidlink::{DeviceAccess, DeviceFilter, ErrorKind, HidContext, HidError, Timeout};

const PATH: &str = "\\\\?\\hid#mock&col01";

/// Shared buffer the log subscriber writes into, for asserting over output.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> LogCapture {
        self.clone()
    }
}

fn fixture() -> (HidContext, hidlink::mock::MockDeviceHandle) {
    let mock = MockHid::new();
    // 65-byte reports: 64 payload bytes plus the report-ID byte.
    let handle = mock.add_device(descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 65, 65, PATH));
    (HidContext::with_mock(mock), handle)
}

#[test]
fn test_open_rejects_invalid_access_before_device_is_touched() {
    let (hid, handle) = fixture();
    let mut session = hid.create(&descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 65, 65, PATH)).unwrap();

    let err = session.open(DeviceAccess::empty()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = session
        .open(DeviceAccess::from_bits_retain(0x80))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_eq!(handle.open_count(), 0);
    assert!(!session.is_open());
}

#[test]
fn test_write_on_closed_session_opens_and_closes_transiently() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    session.write(&[0xAA, 0xBB]).unwrap();

    assert!(!session.is_open());
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(handle.last_access(), Some(DeviceAccess::WRITE));
}

#[test]
fn test_explicit_open_keeps_the_handle_across_transfers() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    session.open(DeviceAccess::READ_WRITE).unwrap();
    handle.queue_input(&[0x01]);
    session.write(&[0x10]).unwrap();
    session.read(Timeout::Millis(100)).unwrap();

    assert!(session.is_open());
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.close_count(), 0);

    session.close();
    assert!(!session.is_open());
    assert_eq!(handle.close_count(), 1);
}

#[test]
fn test_open_twice_is_a_no_op() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    session.open(DeviceAccess::READ).unwrap();
    session.open(DeviceAccess::READ_WRITE).unwrap();
    assert_eq!(handle.open_count(), 1);
}

#[test]
fn test_write_frames_pads_and_truncates() {
    let mock = MockHid::new();
    // 9-byte output reports: room for 8 payload bytes.
    let handle = mock.add_device(descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 9, 9, PATH));
    let hid = HidContext::with_mock(mock);
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    // Oversized payload is trimmed to the report capacity.
    session
        .write(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
        .unwrap();
    // Short payload is zero-padded to the full report.
    session.write(&[0xFF, 0xEE]).unwrap();

    let written = handle.written();
    assert_eq!(written[0], vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(written[1], vec![0, 0xFF, 0xEE, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_read_strips_the_report_id_byte() {
    let mock = MockHid::new();
    let handle = mock.add_device(descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 5, 5, PATH));
    let hid = HidContext::with_mock(mock);
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    handle.queue_input(&[0x00, 0xDE, 0xAD, 0xBE, 0xEF]);
    let data = session.read(Timeout::Millis(100)).unwrap();

    assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(data.len(), descriptor.input_report_byte_length as usize - 1);
}

#[test]
fn test_read_into_copies_at_most_destination_len() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    handle.queue_input(&[0x00, 0x11, 0x22, 0x33, 0x44]);
    let mut small = [0u8; 3];
    let n = session.read_into(&mut small, Timeout::Millis(100)).unwrap();
    assert_eq!(n, 3);
    assert_eq!(small, [0x11, 0x22, 0x33]);

    handle.queue_input(&[0x00, 0x55]);
    let mut large = [0u8; 256];
    let n = session.read_into(&mut large, Timeout::Millis(100)).unwrap();
    assert_eq!(n, descriptor.input_report_byte_length as usize - 1);
    assert_eq!(large[0], 0x55);
}

#[test]
fn test_read_with_infinite_timeout_returns_data() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    handle.queue_input(&[0x00, 0x99]);
    let data = session.read(Timeout::Infinite).unwrap();
    assert_eq!(data[0], 0x99);

    // A maximal bounded wait delivers pending data the same way.
    handle.queue_input(&[0x00, 0x9A]);
    let data = session.read(Timeout::Millis(u32::MAX)).unwrap();
    assert_eq!(data[0], 0x9A);
}

#[test]
fn test_read_times_out_when_no_report_arrives() {
    let (hid, _handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    let err = session.read(Timeout::Millis(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[test]
fn test_report_completing_during_cancellation_is_delivered() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    handle.queue_race_input(&[0x00, 0x42]);
    let data = session.read(Timeout::Millis(10)).unwrap();
    assert_eq!(data[0], 0x42);
}

#[test]
fn test_disconnect_forces_the_session_closed() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    session.open(DeviceAccess::READ_WRITE).unwrap();
    handle.fail_next_read(HidError::new(
        ErrorKind::DeviceNotConnected,
        "device is not connected",
    ));

    let err = session.read(Timeout::Millis(100)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotConnected);
    assert!(!session.is_open());

    // The next transfer reopens instead of failing on a stale handle.
    session.write(&[0x01]).unwrap();
    assert_eq!(handle.open_count(), 2);
}

#[test]
fn test_disconnect_is_logged_as_a_warning() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .finish();

    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();
    handle.fail_next_read(HidError::new(
        ErrorKind::DeviceNotConnected,
        "device is not connected",
    ));

    tracing::subscriber::with_default(subscriber, || {
        let err = session.read(Timeout::Millis(100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceNotConnected);
    });

    let logged = capture.contents();
    assert!(logged.contains("device disconnected"));
    assert!(logged.contains(r"hid#mock"));
}

#[test]
fn test_dropping_a_session_releases_the_device() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();
    session.open_default().unwrap();
    assert!(handle.is_open());

    drop(session);
    assert!(!handle.is_open());
    assert_eq!(handle.close_count(), 1);
}

#[test]
fn test_enumerate_filters_and_restarts() {
    let mock = MockHid::new();
    mock.add_device(descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 65, 65, "a"));
    mock.add_device(descriptor(0x3151, 0x5020, 0x0001, 0x0006, 9, 9, "b"));
    mock.add_device(descriptor(0x046D, 0xC24F, 0x0001, 0x0005, 17, 17, "c"));
    let hid = HidContext::with_mock(mock);

    let by_vendor: Vec<_> = hid.enumerate(DeviceFilter::any().vendor_id(0x3151)).collect();
    assert_eq!(by_vendor.len(), 2);

    let by_usage: Vec<_> = hid
        .enumerate(DeviceFilter::any().usage_page(0xFF00).usage_id(0x0001))
        .collect();
    assert_eq!(by_usage.len(), 1);
    assert_eq!(by_usage[0].device_path, "a");

    let none: Vec<_> = hid.enumerate(DeviceFilter::any().product_id(0x9999)).collect();
    assert!(none.is_empty());

    // A fresh call re-scans from the start.
    assert_eq!(hid.enumerate(DeviceFilter::any()).count(), 3);
    assert_eq!(hid.enumerate(DeviceFilter::any()).count(), 3);
}

#[test]
fn test_try_adapters_record_the_last_error() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    assert!(!session.try_open(DeviceAccess::empty()));
    assert_eq!(
        session.last_error().map(HidError::kind),
        Some(ErrorKind::InvalidArgument)
    );

    assert!(session.try_write(&[0x01]));
    assert!(session.last_error().is_none());

    assert!(session.try_read(Timeout::Millis(0)).is_none());
    assert_eq!(
        session.last_error().map(HidError::kind),
        Some(ErrorKind::Timeout)
    );

    handle.queue_input(&[0x00, 0x07]);
    let data = session.try_read(Timeout::Millis(100)).unwrap();
    assert_eq!(data[0], 0x07);
    assert!(session.last_error().is_none());
}

#[test]
fn test_create_rejects_an_unknown_device_path() {
    let hid = HidContext::with_mock(MockHid::new());
    let err = hid
        .create(&descriptor(0x3151, 0x4010, 0xFF00, 0x0001, 65, 65, "gone"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_device_in_use_surfaces_from_open() {
    let (hid, handle) = fixture();
    let descriptor = hid.enumerate(DeviceFilter::any()).next().unwrap();
    let mut session = hid.create(&descriptor).unwrap();

    handle.fail_open(HidError::new(
        ErrorKind::DeviceInUse,
        "device is being used by another process and cannot be accessed",
    ));
    let err = session.open_default().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceInUse);
    assert!(!session.is_open());

    // The condition is transient; a later open succeeds.
    session.open_default().unwrap();
    assert!(session.is_open());
}
