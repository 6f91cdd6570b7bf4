//! Zeroconf discovery descriptors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A zeroconf announcement for a native-API device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroconfInfo {
    /// Resolved IP address of the announcement.
    pub host: String,
    pub port: u16,
    /// Fully-qualified hostname, e.g. `livingroom.local.`.
    pub hostname: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ZeroconfInfo {
    /// The hostname without its trailing dot (`livingroom.local`).
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.hostname.strip_suffix('.').unwrap_or(&self.hostname)
    }

    /// The node name without the domain suffix (`livingroom`).
    #[must_use]
    pub fn node_name(&self) -> &str {
        let local_name = self.local_name();
        local_name.strip_suffix(".local").unwrap_or(local_name)
    }

    /// The address advertised by the device, falling back to the local name.
    #[must_use]
    pub fn address(&self) -> &str {
        self.properties
            .get("address")
            .map_or_else(|| self.local_name(), String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(hostname: &str, properties: &[(&str, &str)]) -> ZeroconfInfo {
        ZeroconfInfo {
            host: "192.168.43.183".to_string(),
            port: 6053,
            hostname: hostname.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn should_strip_domain_suffix_from_node_name() {
        let info = info("livingroom.local.", &[]);
        assert_eq!(info.local_name(), "livingroom.local");
        assert_eq!(info.node_name(), "livingroom");
    }

    #[test]
    fn should_fall_back_to_local_name_for_address() {
        let info = info("livingroom.local.", &[]);
        assert_eq!(info.address(), "livingroom.local");
    }

    #[test]
    fn should_prefer_address_property() {
        let first = info("test8266.local.", &[("address", "test8266.local")]);
        assert_eq!(first.address(), "test8266.local");
        let second = info("test8266.local.", &[("address", "10.0.0.2")]);
        assert_eq!(second.address(), "10.0.0.2");
    }

    #[test]
    fn should_keep_hostname_without_suffix_untouched() {
        let info = info("node", &[]);
        assert_eq!(info.node_name(), "node");
    }
}
