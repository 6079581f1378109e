//! Process-wide logging setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, LoggingConfig};

/// Initialize logging from `RUST_LOG` / `LOG_FORMAT`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    crate::tracing::init(&LoggingConfig::from_env());
}
