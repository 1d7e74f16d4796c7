//! Process-wide tracing setup shared by the binaries.

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize human-readable logging on stderr.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Text, DEFAULT_FILTER);
}

/// Initialize JSON logging on stderr, for log shippers.
pub fn init_json() {
    tracing::init(LogFormat::Json, DEFAULT_FILTER);
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Tracing configuration (filters, layers).
pub mod tracing;
