use crate::logging::LogFormat;

/// Loopback port bound by whichever handler currently holds the store lock.
///
/// Every handler sharing this value serialises its store access against
/// every other, regardless of which store file each one opens.
pub const DEFAULT_LOCK_PORT: u16 = 49993;

/// File name appended to the store path supplied with each request.
pub const DEFAULT_STORE_FILE: &str = "enc.db";

/// Default log filter expression used by the handler binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Returns [`DEFAULT_LOG_FILTER`], for use as a serde or clap default.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the handler binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
