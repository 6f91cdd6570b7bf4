//! MySensors adapter error types.

use std::path::PathBuf;

use homelink_domain::error::{HubError, NotFoundError};

/// Errors specific to the MySensors gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The configured device is not usable for the gateway type.
    #[error("invalid device {0:?}")]
    InvalidDevice(String),

    /// The protocol version isn't of the form `major.minor`.
    #[error("invalid protocol version {0:?}")]
    InvalidVersion(String),

    #[error("baud rate must be non-zero")]
    InvalidBaudRate,

    /// The persistence file couldn't be read.
    #[error("unable to read persistence file {path}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted or fixture nodes weren't valid JSON.
    #[error("malformed node data")]
    Decode(#[from] serde_json::Error),

    /// The transport failed to connect or send.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message couldn't be sent because the gateway isn't connected.
    #[error("gateway not connected")]
    NotConnected,

    /// A line didn't follow the serial protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown node {0}")]
    UnknownNode(u8),

    #[error("unknown child {child_id} on node {node_id}")]
    UnknownChild { node_id: u8, child_id: u8 },

    /// A domain-level error (validation, event publishing, …).
    #[error("domain error")]
    Domain(#[source] HubError),
}

impl GatewayError {
    /// Convert into a [`HubError`] for propagation across port boundaries.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            Self::UnknownNode(node_id) => NotFoundError {
                entity: "Node",
                id: node_id.to_string(),
            }
            .into(),
            Self::UnknownChild { node_id, child_id } => NotFoundError {
                entity: "ChildSensor",
                id: format!("{node_id}/{child_id}"),
            }
            .into(),
            other => HubError::Storage(Box::new(other)),
        }
    }
}

impl From<GatewayError> for HubError {
    fn from(err: GatewayError) -> Self {
        err.into_domain()
    }
}
