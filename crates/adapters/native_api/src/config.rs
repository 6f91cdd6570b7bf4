//! Native API client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the native API client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NativeApiConfig {
    /// Sent to devices in the hello message.
    pub client_info: String,
    /// Limit for resolving and connecting, in seconds.
    pub connect_timeout_secs: u64,
    /// Limit for each request/response exchange, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for NativeApiConfig {
    fn default() -> Self {
        Self {
            client_info: "homelink".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl NativeApiConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
