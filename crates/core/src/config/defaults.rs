//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_BACKEND_PROVIDER: &str = "http";
pub(crate) const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

pub(crate) fn default_backend_provider() -> String {
    DEFAULT_BACKEND_PROVIDER.to_string()
}

pub(crate) fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_base_delay_secs() -> u64 {
    5
}

pub(crate) fn default_max_delay_secs() -> u64 {
    // Must stay comfortably under the platform's single-invocation cap
    // (5 minutes for the handler function this controller runs as).
    60
}

pub(crate) fn default_service_timeout_secs() -> u64 {
    180
}
