//! Sensor nodes and their children, in the persistence file's JSON shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Node table keyed by node id.
pub type Nodes = BTreeMap<u8, Node>;

/// A radio node (an Arduino sketch) and the sensors it presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub sensor_id: u8,
    #[serde(default)]
    pub children: BTreeMap<u8, ChildSensor>,
    /// Presentation type of the node itself (plain or repeater).
    #[serde(rename = "type")]
    pub node_type: u8,
    #[serde(default)]
    pub sketch_name: Option<String>,
    #[serde(default)]
    pub sketch_version: Option<String>,
    #[serde(default)]
    pub battery_level: u8,
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub heartbeat: u32,
}

impl Node {
    /// Display name: the sketch name, or `Node <id>` before presentation.
    #[must_use]
    pub fn name(&self) -> String {
        match self.sketch_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Node {}", self.sensor_id),
        }
    }
}

/// A sensor presented by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSensor {
    pub id: u8,
    #[serde(rename = "type")]
    pub presentation_type: u8,
    #[serde(default)]
    pub description: String,
    /// Latest payload per value type.
    #[serde(default)]
    pub values: BTreeMap<u8, String>,
}

/// Decode a persistence file (or fixture) into a node table.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] for malformed JSON.
pub fn decode_nodes(json: &str) -> Result<Nodes, GatewayError> {
    Ok(serde_json::from_str(json)?)
}
