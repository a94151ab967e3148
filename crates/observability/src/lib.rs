//! Process-wide tracing setup shared by the ForgePOS binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, LogSettings};

/// Initialize tracing from the environment (`RUST_LOG`, `FORGEPOS_LOG_FORMAT`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    crate::tracing::init(&LogSettings::from_env());
}
