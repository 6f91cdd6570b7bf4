//! Gateway: owns the node table and talks to the transport.

use homelink_app::ports::EventPublisher;
use homelink_domain::event::{Event, EventType};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::node::{ChildSensor, Node, Nodes};
use crate::ports::{Persistence, Transport};
use crate::protocol::{Command, Message, NODE_CHILD_ID, internal, presentation};

pub struct Gateway<T, S, P> {
    config: GatewayConfig,
    transport: T,
    persistence: S,
    publisher: P,
    nodes: Nodes,
    connected: bool,
}

impl<T, S, P> Gateway<T, S, P>
where
    T: Transport + Send + Sync,
    S: Persistence + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(config: GatewayConfig, transport: T, persistence: S, publisher: P) -> Self {
        Self {
            config,
            transport,
            persistence,
            publisher,
            nodes: Nodes::new(),
            connected: false,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn node(&self, node_id: u8) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Merge the persisted node table into the current one, returning how
    /// many nodes were loaded.
    ///
    /// # Errors
    ///
    /// Returns the persistence error.
    #[tracing::instrument(skip(self), fields(device = %self.config.device))]
    pub async fn start_persistence(&mut self) -> Result<usize, GatewayError> {
        let loaded = self.persistence.load().await?;
        let count = loaded.len();
        self.nodes.extend(loaded);
        tracing::debug!(count, "nodes loaded");
        Ok(count)
    }

    /// Connect the transport.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`GatewayError::Domain`] when the
    /// connection event can't be published.
    #[tracing::instrument(skip(self), fields(device = %self.config.device))]
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        self.transport.connect().await?;
        self.on_conn_made().await
    }

    /// Called once the transport is up.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Domain`] when the event can't be published.
    pub async fn on_conn_made(&mut self) -> Result<(), GatewayError> {
        self.connected = true;
        tracing::info!(device = %self.config.device, "gateway connected");
        let data = serde_json::json!({
            "device": self.config.device,
            "gateway_type": self.config.gateway_type,
            "version": self.config.version,
        });
        self.publisher
            .publish(Event::new(EventType::GatewayConnected, None, data))
            .await
            .map_err(GatewayError::Domain)
    }

    /// Disconnect the transport if connected.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn stop(&mut self) -> Result<(), GatewayError> {
        if self.connected {
            self.connected = false;
            self.transport.disconnect().await?;
            tracing::info!(device = %self.config.device, "gateway disconnected");
        }
        Ok(())
    }

    /// Send a value to a child and remember it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownNode`] / [`GatewayError::UnknownChild`]
    /// for unknown targets, [`GatewayError::NotConnected`] before
    /// [`start`](Self::start), or the transport error.
    pub async fn set_child_value(
        &mut self,
        node_id: u8,
        child_id: u8,
        value_type: u8,
        value: impl Into<String>,
    ) -> Result<(), GatewayError> {
        let value = value.into();
        self.child_mut(node_id, child_id)?;
        if !self.connected {
            return Err(GatewayError::NotConnected);
        }
        let message = Message::set(node_id, child_id, value_type, value.clone());
        self.transport.send(message.encode()).await?;
        self.child_mut(node_id, child_id)?
            .values
            .insert(value_type, value);
        Ok(())
    }

    fn child_mut(&mut self, node_id: u8, child_id: u8) -> Result<&mut ChildSensor, GatewayError> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(GatewayError::UnknownNode(node_id))?
            .children
            .get_mut(&child_id)
            .ok_or(GatewayError::UnknownChild { node_id, child_id })
    }

    /// Apply a line received from the transport. Returns the `(node, child)`
    /// whose value changed, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Protocol`] for malformed lines, or
    /// [`GatewayError::UnknownNode`] / [`GatewayError::UnknownChild`] for
    /// values from sensors that never presented themselves.
    pub fn handle_line(&mut self, line: &str) -> Result<Option<(u8, u8)>, GatewayError> {
        let message: Message = line.parse()?;
        tracing::trace!(%message, "received");
        match message.command {
            Command::Set => {
                self.child_mut(message.node_id, message.child_id)?
                    .values
                    .insert(message.value_type, message.payload);
                Ok(Some((message.node_id, message.child_id)))
            }
            Command::Presentation => {
                let node = self.nodes.entry(message.node_id).or_insert_with(|| Node {
                    sensor_id: message.node_id,
                    children: Default::default(),
                    node_type: presentation::S_ARDUINO_NODE,
                    sketch_name: None,
                    sketch_version: None,
                    battery_level: 0,
                    protocol_version: None,
                    heartbeat: 0,
                });
                if message.child_id == NODE_CHILD_ID {
                    node.node_type = message.value_type;
                    node.protocol_version = Some(message.payload);
                } else {
                    let child = node
                        .children
                        .entry(message.child_id)
                        .or_insert_with(|| ChildSensor {
                            id: message.child_id,
                            presentation_type: message.value_type,
                            description: String::new(),
                            values: Default::default(),
                        });
                    child.presentation_type = message.value_type;
                    child.description = message.payload;
                }
                Ok(None)
            }
            Command::Internal => {
                let Some(node) = self.nodes.get_mut(&message.node_id) else {
                    return Ok(None);
                };
                match message.value_type {
                    internal::I_BATTERY_LEVEL => {
                        if let Ok(level) = message.payload.parse() {
                            node.battery_level = level;
                        }
                    }
                    internal::I_SKETCH_NAME => node.sketch_name = Some(message.payload),
                    internal::I_SKETCH_VERSION => node.sketch_version = Some(message.payload),
                    _ => {}
                }
                Ok(None)
            }
            Command::Req | Command::Stream => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homelink_app::event_bus::InProcessEventBus;

    use super::*;
    use crate::node::decode_nodes;
    use crate::protocol::set_req;

    struct NullTransport;

    impl Transport for NullTransport {
        async fn connect(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn send(&self, _line: String) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct NoPersistence;

    impl Persistence for NoPersistence {
        async fn load(&self) -> Result<Nodes, GatewayError> {
            Ok(Nodes::new())
        }
    }

    fn gateway() -> Gateway<NullTransport, NoPersistence, Arc<InProcessEventBus>> {
        Gateway::new(
            GatewayConfig::default(),
            NullTransport,
            NoPersistence,
            Arc::new(InProcessEventBus::new(4)),
        )
    }

    #[test]
    fn should_register_presented_nodes_and_children() {
        let mut gateway = gateway();

        gateway.handle_line("4;255;0;0;17;2.3.2\n").unwrap();
        gateway.handle_line("4;1;0;0;6;porch\n").unwrap();
        gateway.handle_line("4;255;3;0;11;Porch Node\n").unwrap();
        gateway.handle_line("4;255;3;0;0;77\n").unwrap();

        let node = gateway.node(4).unwrap();
        assert_eq!(node.protocol_version.as_deref(), Some("2.3.2"));
        assert_eq!(node.name(), "Porch Node");
        assert_eq!(node.battery_level, 77);
        assert_eq!(node.children[&1].presentation_type, presentation::S_TEMP);
        assert_eq!(node.children[&1].description, "porch");
    }

    #[test]
    fn should_store_received_values() {
        let mut gateway = gateway();
        gateway.nodes = decode_nodes(
            r#"{"1": {"sensor_id": 1, "type": 17, "children": {"1": {"id": 1, "type": 13, "values": {}}}}}"#,
        )
        .unwrap();

        let changed = gateway.handle_line("1;1;1;0;17;950").unwrap();

        assert_eq!(changed, Some((1, 1)));
        assert_eq!(gateway.node(1).unwrap().children[&1].values[&set_req::V_WATT], "950");
    }

    #[test]
    fn should_reject_value_from_unknown_node() {
        let mut gateway = gateway();
        let result = gateway.handle_line("9;1;1;0;0;20");
        assert!(matches!(result, Err(GatewayError::UnknownNode(9))));
    }

    #[tokio::test]
    async fn should_refuse_to_send_before_start() {
        let mut gateway = gateway();
        gateway.handle_line("1;255;0;0;17;2.3.2").unwrap();
        gateway.handle_line("1;1;0;0;13;").unwrap();

        let result = gateway.set_child_value(1, 1, set_req::V_WATT, "10").await;

        assert!(matches!(result, Err(GatewayError::NotConnected)));
    }
}
