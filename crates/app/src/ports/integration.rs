//! Integration port: lifecycle and service-call handling for device integrations.
//!
//! An integration bridges an external protocol (sensor gateway, device API, …)
//! into the homelink system. It discovers devices and entities on setup and
//! handles service calls directed at entities it owns.

use std::future::Future;

use homelink_domain::device::Device;
use homelink_domain::entity::Entity;
use homelink_domain::error::HubError;
use homelink_domain::service::ServiceCall;

/// A pluggable device integration.
///
/// The caller drives the lifecycle in order:
///
/// 1. [`setup`](Self::setup): connect and report what is known
/// 2. [`handle_service_call`](Self::handle_service_call) while running
/// 3. [`teardown`](Self::teardown): clean up resources
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"mysensors"`).
    fn name(&self) -> &'static str;

    /// Initialise the integration and return the devices it knows about.
    fn setup(&mut self) -> impl Future<Output = Result<Vec<DiscoveredDevice>, HubError>> + Send;

    /// Handle a service call for an entity owned by this integration.
    fn handle_service_call(
        &self,
        call: ServiceCall,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Called on graceful shutdown.
    fn teardown(&mut self) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// A device and its associated entities discovered during integration setup.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub device: Device,
    pub entities: Vec<Entity>,
}
