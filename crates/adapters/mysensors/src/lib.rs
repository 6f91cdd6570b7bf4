//! # homelink-adapter-mysensors
//!
//! Integration for MySensors gateways: a controller bridging a radio sensor
//! network to homelink over serial, TCP or MQTT.
//!
//! ## Responsibilities
//! - Gateway configuration and validation
//! - The node table, seeded from the persistence file and kept up to date
//!   with child values
//! - Mapping nodes and their children onto devices and `sensor.*` entities
//!
//! The physical link is abstracted behind the [`Transport`] port; the
//! gateway only speaks the line protocol (`node;child;cmd;ack;type;payload`).

mod config;
mod entities;
mod error;
mod gateway;
mod integration;
mod node;
mod ports;

pub mod protocol;

pub use config::{GatewayConfig, GatewayType};
pub use entities::{ValueKind, discover_node};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use integration::{MySensorsIntegration, SERVICE_SET_CHILD_VALUE};
pub use node::{ChildSensor, Node, Nodes, decode_nodes};
pub use ports::{DeviceProbe, JsonFilePersistence, Persistence, SystemProbe, Transport};

/// Integration domain.
pub const DOMAIN: &str = "mysensors";
