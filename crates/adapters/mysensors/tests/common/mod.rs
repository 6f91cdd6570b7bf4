//! Test harness: a mocked transport and fixture-backed persistence so the
//! gateway's node table can be seeded without hardware.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use homelink_adapter_mysensors::{
    DeviceProbe, Gateway, GatewayConfig, GatewayError, MySensorsIntegration, Nodes, Persistence,
    Transport, decode_nodes,
};
use homelink_app::event_bus::InProcessEventBus;

/// Records what the gateway asked of the link; clones share the record.
#[derive(Clone, Default)]
pub struct MockTransport {
    pub connects: Arc<Mutex<usize>>,
    pub disconnects: Arc<Mutex<usize>>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn connect_count(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), GatewayError> {
        *self.connects.lock().unwrap() += 1;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        *self.disconnects.lock().unwrap() += 1;
        Ok(())
    }

    async fn send(&self, line: String) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(line);
        Ok(())
    }
}

/// Persistence returning whatever the test put in the shared node table.
#[derive(Clone, Default)]
pub struct FixturePersistence {
    pub nodes: Arc<Mutex<Nodes>>,
}

impl Persistence for FixturePersistence {
    async fn load(&self) -> Result<Nodes, GatewayError> {
        Ok(self.nodes.lock().unwrap().clone())
    }
}

/// Device check with a fixed answer for every path.
#[derive(Clone, Copy)]
pub struct FixedDevices(pub bool);

impl DeviceProbe for FixedDevices {
    fn is_serial_port(&self, _device: &str) -> bool {
        self.0
    }
}

/// Load a nodes fixture from `tests/fixtures`.
pub fn load_nodes_state(fixture: &str) -> Nodes {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(fixture);
    let json = std::fs::read_to_string(path).unwrap();
    decode_nodes(&json).unwrap()
}

/// Add `nodes` to the table the gateway will load, returning them.
pub fn update_gateway_nodes(gateway_nodes: &FixturePersistence, nodes: Nodes) -> Nodes {
    gateway_nodes.nodes.lock().unwrap().extend(nodes.clone());
    nodes
}

/// Config entry data of a serial gateway.
pub fn serial_entry_data() -> serde_json::Value {
    serde_json::json!({
        "gateway_type": "serial",
        "version": "2.3",
        "device": "/test/device",
        "baud_rate": 115_200,
    })
}

pub type TestIntegration =
    MySensorsIntegration<MockTransport, FixturePersistence, Arc<InProcessEventBus>, FixedDevices>;

pub struct Harness {
    pub transport: MockTransport,
    pub gateway_nodes: FixturePersistence,
    pub bus: Arc<InProcessEventBus>,
    pub integration: TestIntegration,
}

/// An integration on a serial gateway with mocked transport and persistence.
pub fn integration() -> Harness {
    integration_with_devices(FixedDevices(true))
}

/// Same as [`integration`], with `devices` deciding whether the device exists.
pub fn integration_with_devices(devices: FixedDevices) -> Harness {
    let config = GatewayConfig::from_entry_data(&serial_entry_data()).unwrap();
    let transport = MockTransport::default();
    let gateway_nodes = FixturePersistence::default();
    let bus = Arc::new(InProcessEventBus::new(16));
    let gateway = Gateway::new(
        config,
        transport.clone(),
        gateway_nodes.clone(),
        Arc::clone(&bus),
    );
    Harness {
        transport,
        gateway_nodes,
        bus,
        integration: MySensorsIntegration::new(gateway, devices),
    }
}
