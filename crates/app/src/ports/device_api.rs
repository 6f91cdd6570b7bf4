//! Device API port: the client side of a native-API session.
//!
//! A config flow only needs two things from a device: "who are you?" and
//! "is this password right?". Both open a fresh connection and always close
//! it before returning.

use std::future::Future;

use homelink_domain::native_api::{ConnectionParams, DeviceInfo};

/// Failure talking to a device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiConnectionError {
    /// The host name could not be resolved to an address.
    #[error("error resolving {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// The TCP connection could not be established.
    #[error("error connecting to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The device did not answer in time.
    #[error("timeout while talking to the device")]
    Timeout,

    /// The device rejected the password.
    #[error("invalid password")]
    InvalidPassword,

    /// The device answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket failure after the connection was established.
    #[error("io error: {0}")]
    Io(String),
}

impl ApiConnectionError {
    /// Whether the failure happened while resolving the host.
    #[must_use]
    pub fn is_resolve(&self) -> bool {
        matches!(self, Self::Resolve { .. })
    }
}

/// Client for the native API of a device.
pub trait DeviceApiClient {
    /// Connect without logging in and ask the device to describe itself.
    fn device_info(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<DeviceInfo, ApiConnectionError>> + Send;

    /// Connect and log in with `params.password`.
    fn login(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<(), ApiConnectionError>> + Send;
}

impl<T: DeviceApiClient + Send + Sync> DeviceApiClient for std::sync::Arc<T> {
    fn device_info(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<DeviceInfo, ApiConnectionError>> + Send {
        (**self).device_info(params)
    }

    fn login(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<(), ApiConnectionError>> + Send {
        (**self).login(params)
    }
}
