//! Ports the gateway is driven through.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::GatewayError;
use crate::node::{Nodes, decode_nodes};

/// The physical link to the gateway.
pub trait Transport {
    fn connect(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Write one encoded protocol line.
    fn send(&self, line: String) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Source of the node table persisted by a previous run.
pub trait Persistence {
    fn load(&self) -> impl Future<Output = Result<Nodes, GatewayError>> + Send;
}

/// Checks whether a path points at a serial device.
pub trait DeviceProbe {
    fn is_serial_port(&self, device: &str) -> bool;
}

/// [`DeviceProbe`] looking at the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
    fn is_serial_port(&self, device: &str) -> bool {
        !device.is_empty() && Path::new(device).exists()
    }
}

/// Reads the node table from a JSON persistence file.
///
/// A missing file is an empty table: the gateway hasn't seen any node yet.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Persistence for JsonFilePersistence {
    async fn load(&self) -> Result<Nodes, GatewayError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => decode_nodes(&json),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no persistence file yet");
                Ok(Nodes::new())
            }
            Err(source) => Err(GatewayError::Persistence {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[tokio::test]
    async fn should_load_nodes_from_file() {
        let persistence = JsonFilePersistence::new(fixture("power_sensor_state.json"));
        let nodes = persistence.load().await.unwrap();
        assert_eq!(nodes[&1].name(), "Power Sensor");
    }

    #[tokio::test]
    async fn should_treat_missing_file_as_empty() {
        let persistence = JsonFilePersistence::new(fixture("missing.json"));
        assert!(persistence.load().await.unwrap().is_empty());
    }

    #[test]
    fn should_reject_missing_serial_device() {
        assert!(!SystemProbe.is_serial_port("/does/not/exist"));
        assert!(!SystemProbe.is_serial_port(""));
    }
}
