/// Default log filter expression used by the proxy binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Host used when a bare `:port` address omits the interface.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Default log filter expression used by the proxy binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the proxy binary.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
