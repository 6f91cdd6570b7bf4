//! Gateway configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::ports::DeviceProbe;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_VERSION: &str = "2.3";
pub const DEFAULT_TCP_PORT: u16 = 5003;

/// How the gateway is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayType {
    #[default]
    Serial,
    Tcp,
    Mqtt,
}

/// Configuration of one gateway, as stored in its config entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub gateway_type: GatewayType,
    /// Serial port path, TCP host, or MQTT topic prefix depending on the type.
    pub device: String,
    pub baud_rate: u32,
    pub tcp_port: u16,
    /// Protocol version spoken by the gateway.
    pub version: String,
    /// Where the node table is persisted between runs.
    pub persistence_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_type: GatewayType::Serial,
            device: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            tcp_port: DEFAULT_TCP_PORT,
            version: DEFAULT_VERSION.to_string(),
            persistence_file: None,
        }
    }
}

impl GatewayConfig {
    /// Read the configuration from config entry data.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Decode`] when the data doesn't match.
    pub fn from_entry_data(data: &serde_json::Value) -> Result<Self, GatewayError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    /// Check the configuration, using `probe` for serial devices.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidDevice`], [`GatewayError::InvalidVersion`]
    /// or [`GatewayError::InvalidBaudRate`].
    pub fn validate(&self, probe: &impl DeviceProbe) -> Result<(), GatewayError> {
        let device_ok = match self.gateway_type {
            GatewayType::Serial => probe.is_serial_port(&self.device),
            GatewayType::Tcp | GatewayType::Mqtt => !self.device.trim().is_empty(),
        };
        if !device_ok {
            return Err(GatewayError::InvalidDevice(self.device.clone()));
        }
        if self.gateway_type == GatewayType::Serial && self.baud_rate == 0 {
            return Err(GatewayError::InvalidBaudRate);
        }
        let valid_version = self
            .version
            .split_once('.')
            .is_some_and(|(major, minor)| major.parse::<u8>().is_ok() && minor.parse::<u8>().is_ok());
        if !valid_version {
            return Err(GatewayError::InvalidVersion(self.version.clone()));
        }
        Ok(())
    }
}
