//! Descriptors for devices speaking the native API: how to reach them and
//! what they report about themselves.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Config entry domain for native-API devices.
pub const DOMAIN: &str = "native_api";

/// TCP port devices listen on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 6053;

/// Everything needed to open an API session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    /// Empty means "no password".
    pub password: String,
}

impl ConnectionParams {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: String::new(),
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Check that the target is addressable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyHost`] or [`ValidationError::InvalidPort`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// What a device reports about itself after connecting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Node name, unique on the local network.
    pub name: String,
    pub uses_password: bool,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub model: String,
}

/// Data stored in a native-API config entry.
///
/// The password is always present: the wire protocol cannot represent an
/// absent string, so an empty string stands for "no password".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: String,
}

impl EntryData {
    /// Convert into a JSON object suitable for [`ConfigEntry::data`](crate::config_entry::ConfigEntry).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "host": self.host,
            "port": self.port,
            "password": self.password,
        })
    }
}

impl From<&EntryData> for ConnectionParams {
    fn from(data: &EntryData) -> Self {
        Self::new(data.host.clone(), data.port).with_password(data.password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_empty_password_instead_of_omitting_it() {
        let data = EntryData {
            host: "127.0.0.1".to_string(),
            port: 80,
            password: String::new(),
        };
        assert_eq!(
            data.to_json(),
            serde_json::json!({"host": "127.0.0.1", "port": 80, "password": ""})
        );
    }

    #[test]
    fn should_default_missing_password_when_deserializing() {
        let data: EntryData =
            serde_json::from_value(serde_json::json!({"host": "h", "port": 6053})).unwrap();
        assert_eq!(data.password, "");
    }

    #[test]
    fn should_reject_empty_host_and_zero_port() {
        assert_eq!(
            ConnectionParams::new(" ", 6053).validate(),
            Err(ValidationError::EmptyHost)
        );
        assert_eq!(
            ConnectionParams::new("h", 0).validate(),
            Err(ValidationError::InvalidPort)
        );
        assert!(ConnectionParams::new("h", DEFAULT_PORT).validate().is_ok());
    }
}
