//! Process-wide diagnostics toggle
//!
//! Enumeration skips devices it cannot open or query instead of failing the
//! whole scan, which can make a missing device hard to explain. Enabling
//! warnings surfaces those skips through `tracing`. The toggle must be set
//! before the scan starts to take effect.

use std::sync::atomic::{AtomicBool, Ordering};

static ENUMERATION_WARNINGS: AtomicBool = AtomicBool::new(false);

/// Enable or disable warning output for devices skipped during enumeration.
pub fn set_enumeration_warnings(enabled: bool) {
    ENUMERATION_WARNINGS.store(enabled, Ordering::Relaxed);
}

/// Whether enumeration warnings are currently enabled.
pub fn enumeration_warnings() -> bool {
    ENUMERATION_WARNINGS.load(Ordering::Relaxed)
}
