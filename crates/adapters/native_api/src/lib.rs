//! # homelink-adapter-native-api
//!
//! Client for the plaintext native API spoken by network-attached devices.
//!
//! ## Responsibilities
//! - Resolve the device host and open a TCP connection with a timeout
//! - Exchange hello, login, and device-info messages over the frame codec
//! - Always send a disconnect before dropping the connection
//! - Implement the [`DeviceApiClient`](homelink_app::ports::DeviceApiClient)
//!   port used by config flows
//!
//! ## Dependency rule
//! Same as other adapters: depends on `homelink-app` and `homelink-domain`.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;

pub use client::TcpDeviceClient;
pub use config::NativeApiConfig;
pub use error::NativeApiError;
