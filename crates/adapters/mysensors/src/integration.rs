//! [`Integration`] implementation exposing gateway nodes as entities.

use homelink_app::ports::{DiscoveredDevice, EventPublisher, Integration};
use homelink_domain::error::{HubError, ValidationError};
use homelink_domain::service::ServiceCall;
use tokio::sync::Mutex;

use crate::DOMAIN;
use crate::entities::discover_node;
use crate::gateway::Gateway;
use crate::ports::{DeviceProbe, Persistence, Transport};

/// Service sending a value to a child: data `{node_id, child_id,
/// value_type, value}`.
pub const SERVICE_SET_CHILD_VALUE: &str = "set_child_value";

/// Gateway nodes as hub entities; `devices` checks the configured device
/// before the link is opened.
pub struct MySensorsIntegration<T, S, P, D> {
    gateway: Mutex<Gateway<T, S, P>>,
    devices: D,
}

impl<T, S, P, D> MySensorsIntegration<T, S, P, D>
where
    T: Transport + Send + Sync,
    S: Persistence + Send + Sync,
    P: EventPublisher + Send + Sync,
    D: DeviceProbe + Send + Sync,
{
    pub fn new(gateway: Gateway<T, S, P>, devices: D) -> Self {
        Self {
            gateway: Mutex::new(gateway),
            devices,
        }
    }

    /// Run `f` with the gateway locked.
    pub async fn with_gateway<R>(&self, f: impl FnOnce(&mut Gateway<T, S, P>) -> R) -> R {
        let mut gateway = self.gateway.lock().await;
        f(&mut gateway)
    }

    /// Devices and entities for the current node table.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when a node yields invalid ids.
    pub async fn discovered(&self) -> Result<Vec<DiscoveredDevice>, HubError> {
        let gateway = self.gateway.lock().await;
        let gateway_id = gateway.config().device.clone();
        gateway
            .nodes()
            .values()
            .map(|node| discover_node(&gateway_id, node))
            .collect()
    }
}

fn invalid(message: &str) -> HubError {
    ValidationError::InvalidInput(message.to_string()).into()
}

fn read_u8(call: &ServiceCall, key: &str) -> Result<u8, HubError> {
    call.get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| invalid(&format!("{key} must be an integer in 0..=255")))
}

impl<T, S, P, D> Integration for MySensorsIntegration<T, S, P, D>
where
    T: Transport + Send + Sync,
    S: Persistence + Send + Sync,
    P: EventPublisher + Send + Sync,
    D: DeviceProbe + Send + Sync,
{
    fn name(&self) -> &'static str {
        DOMAIN
    }

    async fn setup(&mut self) -> Result<Vec<DiscoveredDevice>, HubError> {
        {
            let gateway = self.gateway.get_mut();
            gateway.config().validate(&self.devices)?;
            gateway.start_persistence().await?;
            gateway.start().await?;
        }
        self.discovered().await
    }

    async fn handle_service_call(&self, call: ServiceCall) -> Result<(), HubError> {
        if call.domain != DOMAIN || call.service != SERVICE_SET_CHILD_VALUE {
            return Err(invalid(&format!("unsupported service {call}")));
        }
        let node_id = read_u8(&call, "node_id")?;
        let child_id = read_u8(&call, "child_id")?;
        let value_type = read_u8(&call, "value_type")?;
        let value = match call.get("value") {
            Some(serde_json::Value::String(value)) => value.clone(),
            Some(serde_json::Value::Number(value)) => value.to_string(),
            Some(serde_json::Value::Bool(value)) => u8::from(*value).to_string(),
            _ => return Err(invalid("value must be a string or a number")),
        };

        self.gateway
            .lock()
            .await
            .set_child_value(node_id, child_id, value_type, value)
            .await?;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), HubError> {
        self.gateway.get_mut().stop().await?;
        Ok(())
    }
}
